use crate::error::FormscanError;
use crate::model::FormRecord;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const ANALYSIS_SUFFIX: &str = "_analysis.json";
pub const FIRST_PASS_SUFFIX: &str = "_first_pass.json";

/// File stem of a form PDF (`form_3.pdf` -> `form_3`).
pub fn form_stem(pdf_path: &Path) -> String {
    pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn analysis_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}{ANALYSIS_SUFFIX}"))
}

pub fn first_pass_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}{FIRST_PASS_SUFFIX}"))
}

/// Recover the form stem from an artifact file name, if it is one.
pub fn stem_of_artifact(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(ANALYSIS_SUFFIX)
        .or_else(|| name.strip_suffix(FIRST_PASS_SUFFIX))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Write a record as pretty UTF-8 JSON, creating parent directories.
pub fn write_record(path: &Path, record: &FormRecord) -> Result<(), FormscanError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| output_error(parent, source))?;
    }
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json).map_err(|source| output_error(path, source))?;
    tracing::debug!(path = %path.display(), "record written");
    Ok(())
}

/// Create `dir` if needed and check that files can be written in it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), FormscanError> {
    std::fs::create_dir_all(dir).map_err(|source| output_error(dir, source))?;
    tempfile::NamedTempFile::new_in(dir).map_err(|source| output_error(dir, source))?;
    Ok(())
}

fn output_error(path: &Path, source: std::io::Error) -> FormscanError {
    FormscanError::OutputWrite {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a record artifact.
///
/// Artifacts whose whole content is a JSON string holding JSON are
/// unwrapped once.
pub fn read_record(path: &Path) -> Result<FormRecord, FormscanError> {
    let content = std::fs::read_to_string(path)?;
    parse_record(&content)
}

pub fn parse_record(content: &str) -> Result<FormRecord, FormscanError> {
    let value: Value = match serde_json::from_str(content)? {
        Value::String(inner) => serde_json::from_str(&inner)?,
        other => other,
    };
    match value {
        Value::Object(record) => Ok(record),
        other => Err(FormscanError::Config(format!(
            "artifact is not a JSON object (found {})",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
