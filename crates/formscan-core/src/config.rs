use crate::analyzer::azure::POLL_TIMEOUT;
use crate::error::FormscanError;
use crate::llm::azure_openai::{CompletionOptions, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TOP_P};
use crate::pipeline::DEFAULT_DPI;
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DOCUMENT_ENDPOINT: &str = "AZURE_DOCUMENT_ENDPOINT";
pub const ENV_DOCUMENT_KEY: &str = "AZURE_DOCUMENT_KEY";
pub const ENV_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";

pub const ENV_TEMPERATURE: &str = "FORMSCAN_LLM_TEMPERATURE";
pub const ENV_MAX_TOKENS: &str = "FORMSCAN_LLM_MAX_TOKENS";
pub const ENV_HTTP_TIMEOUT: &str = "FORMSCAN_HTTP_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "FORMSCAN_MAX_RETRIES";
pub const ENV_POLL_TIMEOUT: &str = "FORMSCAN_OCR_POLL_TIMEOUT_SECS";

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// File locations and render settings, all relative to one base directory.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub prompt_path: PathBuf,
    pub post_process_prompt_path: PathBuf,
    pub schema_path: PathBuf,
    pub sections_path: PathBuf,
    pub generated_pdfs_dir: PathBuf,
    pub analyzed_forms_dir: PathBuf,
    pub master_data_path: PathBuf,
    pub comparison_results_dir: PathBuf,
    pub log_dir: PathBuf,
    pub dpi: u32,
}

impl Settings {
    pub fn from_base_dir(base_dir: &Path) -> Self {
        let resources = base_dir.join("resources");
        let output = base_dir.join("output");
        Settings {
            base_dir: base_dir.to_path_buf(),
            prompt_path: resources.join("prompts").join("prompt.txt"),
            post_process_prompt_path: resources.join("prompts").join("post_process_prompt.txt"),
            schema_path: resources.join("schema.json"),
            sections_path: resources.join("sections.json"),
            generated_pdfs_dir: output.join("generated_pdfs"),
            analyzed_forms_dir: output.join("analyzed_forms"),
            master_data_path: output.join("master_data.csv"),
            comparison_results_dir: output.join("comparison_results"),
            log_dir: base_dir.join("logs"),
            dpi: DEFAULT_DPI,
        }
    }

    pub fn with_dpi(mut self, dpi: u32) -> Result<Self, FormscanError> {
        if dpi == 0 {
            return Err(FormscanError::Config("dpi must be greater than 0".into()));
        }
        self.dpi = dpi;
        Ok(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from_base_dir(Path::new("."))
    }
}

/// Service credentials. Every missing variable is reported at once.
#[derive(Clone)]
pub struct Credentials {
    pub document_endpoint: String,
    pub document_key: String,
    pub openai_api_key: String,
    pub openai_endpoint: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("document_endpoint", &self.document_endpoint)
            .field("document_key", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .field("openai_endpoint", &self.openai_endpoint)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, FormscanError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, FormscanError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut get = |name: &str| match lookup(name).filter(|v| !v.trim().is_empty()) {
            Some(value) => value.trim().to_string(),
            None => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let credentials = Credentials {
            document_endpoint: get(ENV_DOCUMENT_ENDPOINT),
            document_key: get(ENV_DOCUMENT_KEY),
            openai_api_key: get(ENV_OPENAI_API_KEY),
            openai_endpoint: get(ENV_OPENAI_ENDPOINT),
        };

        if missing.is_empty() {
            Ok(credentials)
        } else {
            Err(FormscanError::MissingEnv(missing))
        }
    }
}

/// Optional service tuning from the environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    pub completion: CompletionOptions,
    pub http_timeout: Duration,
    /// Upper bound on waiting for one OCR analysis to finish.
    pub poll_timeout: Duration,
    pub max_attempts: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning {
            completion: CompletionOptions::default(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            poll_timeout: POLL_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Tuning {
    pub fn from_env() -> Result<Self, FormscanError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Unset variables keep their defaults; unparsable ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FormscanError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let temperature: f32 = parse_var(&lookup, ENV_TEMPERATURE)?.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(FormscanError::Config(format!(
                "{ENV_TEMPERATURE} must be between 0 and 2, got {temperature}"
            )));
        }
        let max_tokens = parse_var(&lookup, ENV_MAX_TOKENS)?.unwrap_or(DEFAULT_MAX_TOKENS);
        let timeout_secs: u64 = parse_var(&lookup, ENV_HTTP_TIMEOUT)?
            .unwrap_or(DEFAULT_HTTP_TIMEOUT.as_secs());
        let poll_secs: u64 = parse_var(&lookup, ENV_POLL_TIMEOUT)?.unwrap_or(POLL_TIMEOUT.as_secs());
        let retries: u32 = parse_var(&lookup, ENV_MAX_RETRIES)?.unwrap_or(DEFAULT_MAX_ATTEMPTS - 1);

        Ok(Tuning {
            completion: CompletionOptions {
                temperature,
                top_p: DEFAULT_TOP_P,
                max_tokens,
            },
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
            poll_timeout: Duration::from_secs(poll_secs.max(1)),
            max_attempts: retries.saturating_add(1),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(self.max_attempts)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, FormscanError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| FormscanError::Config(format!("invalid {name}='{raw}': {e}"))),
    }
}
