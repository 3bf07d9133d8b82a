pub mod azure;

use crate::model::OcrResult;
use crate::retry::Retryable;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which class of HTTP failure a document-analysis call hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// 401/403: bad or missing key.
    Auth,
    /// 429.
    Throttled,
    /// 5xx.
    Server,
    /// Any other non-success status.
    Request,
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceErrorKind::Auth => "authentication",
            ServiceErrorKind::Throttled => "throttled",
            ServiceErrorKind::Server => "server",
            ServiceErrorKind::Request => "request",
        };
        f.write_str(s)
    }
}

impl ServiceErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ServiceErrorKind::Auth,
            429 => ServiceErrorKind::Throttled,
            500..=599 => ServiceErrorKind::Server,
            _ => ServiceErrorKind::Request,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("document not found: {0}")]
    NotFound(PathBuf),

    #[error("document analysis {kind} error (HTTP {status}): {message}")]
    Service {
        kind: ServiceErrorKind,
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("document analysis request failed: {0}")]
    Transport(String),

    #[error("document analysis timed out: {0}")]
    Timeout(String),

    #[error("malformed document analysis response: {0}")]
    Malformed(String),

    #[error("document analysis failed: {0}")]
    AnalysisFailed(String),
}

impl Retryable for AnalyzerError {
    fn is_transient(&self) -> bool {
        match self {
            AnalyzerError::Service { kind, .. } => {
                matches!(kind, ServiceErrorKind::Throttled | ServiceErrorKind::Server)
            }
            AnalyzerError::Transport(_) | AnalyzerError::Timeout(_) => true,
            AnalyzerError::NotFound(_)
            | AnalyzerError::Malformed(_)
            | AnalyzerError::AnalysisFailed(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            AnalyzerError::Service { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Trait for document-analysis (OCR) backends.
pub trait DocumentAnalyzer: Send + Sync {
    /// Analyze one image or document file.
    fn analyze(&self, path: &Path) -> Result<OcrResult, AnalyzerError>;

    /// Name of the backend, for logs.
    fn backend_name(&self) -> &str;
}
