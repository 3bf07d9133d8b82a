use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FormscanError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing required environment variables: {}. Set them in the environment or a .env file", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("failed to load {what} from {path}: {reason}")]
    ConfigLoad {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("invalid section layout: {0}")]
    LayoutInvalid(String),

    #[error("invalid field schema: {0}")]
    SchemaInvalid(String),

    #[error("pdftoppm not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    PdftoppmNotFound,

    #[error("pdftoppm failed with exit code {code}: {stderr}")]
    PdftoppmFailed { code: i32, stderr: String },

    #[error("failed to render {path}: {reason}")]
    Render { path: PathBuf, reason: String },

    #[error("failed to read ground truth from {path}: {reason}")]
    GroundTruth { path: PathBuf, reason: String },

    #[error("cannot write output {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Analyzer(#[from] crate::analyzer::AnalyzerError),

    #[error(transparent)]
    Llm(#[from] crate::llm::LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl FormscanError {
    /// Errors that affect every remaining form, so a batch must stop.
    pub fn ends_run(&self) -> bool {
        matches!(
            self,
            FormscanError::OutputWrite { .. } | FormscanError::PdftoppmNotFound
        )
    }
}
