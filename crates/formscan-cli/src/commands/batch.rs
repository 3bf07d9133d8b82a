use formscan_core::batch::run_batch;
use formscan_core::config::Settings;
use formscan_core::error::FormscanError;
use std::path::PathBuf;

use crate::commands::with_pipeline;
use crate::output;

pub fn run(
    input_dir: Option<PathBuf>,
    settings: &Settings,
    force: bool,
    keep_sections: bool,
    output_format: &str,
) -> Result<(), FormscanError> {
    let input_dir = input_dir.unwrap_or_else(|| settings.generated_pdfs_dir.clone());
    let summary = with_pipeline(settings, keep_sections, |pipeline| {
        run_batch(pipeline, &input_dir, force)
    })?;

    let output_str = match output_format {
        "json" => serde_json::to_string_pretty(&summary)?,
        _ => output::table::format_batch(&summary),
    };
    println!("{output_str}");
    Ok(())
}
