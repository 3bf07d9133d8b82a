use chrono::Local;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,formscan_core=info";

/// Install console and file logging.
///
/// Console output goes to stderr so `--output json` stays clean on stdout.
/// Returns the log file path, or `None` when the file could not be created.
pub fn init(log_dir: &Path) -> Option<PathBuf> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let log_path = log_dir.join(format!(
        "formscan_{}.log",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let file = match std::fs::create_dir_all(log_dir).and_then(|_| File::create(&log_path)) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!(
                "warning: cannot write log file {}: {e}; logging to console only",
                log_path.display()
            );
            None
        }
    };
    let opened = file.is_some().then(|| log_path.clone());

    if json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .with(file.map(|f| fmt::layer().json().with_target(true).with_writer(Mutex::new(f))))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(file.map(|f| {
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(Mutex::new(f))
            }))
            .init();
    }

    opened
}
