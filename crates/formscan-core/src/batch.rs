use crate::artifacts;
use crate::error::FormscanError;
use crate::pipeline::{FieldExtractionPipeline, FormOutcome};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const FORM_PREFIX: &str = "form_";

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub found: usize,
    pub processed: usize,
    pub skipped: usize,
    /// Forms that could not be processed at all, with the error.
    pub failed: Vec<(String, String)>,
    /// Processed forms with at least one degraded section.
    pub degraded: Vec<String>,
    /// Processed forms whose reconciliation fell back to the first pass.
    pub not_reconciled: Vec<String>,
}

/// Find `form_*.pdf` files, ordered by their numeric suffix.
///
/// Names without a numeric suffix sort after the numbered ones, by name.
pub fn discover_forms(input_dir: &Path) -> Result<Vec<PathBuf>, FormscanError> {
    if !input_dir.is_dir() {
        return Err(FormscanError::Config(format!(
            "input directory not found: {}",
            input_dir.display()
        )));
    }

    let mut forms = Vec::new();
    for entry in std::fs::read_dir(input_dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf && artifacts::form_stem(&path).starts_with(FORM_PREFIX) {
            forms.push(path);
        }
    }
    forms.sort_by_cached_key(|p| sort_key(p));
    Ok(forms)
}

fn sort_key(path: &Path) -> (u8, u64, String) {
    let stem = artifacts::form_stem(path);
    match stem
        .strip_prefix(FORM_PREFIX)
        .and_then(|n| n.parse::<u64>().ok())
    {
        Some(n) => (0, n, stem),
        None => (1, 0, stem),
    }
}

/// Stems of forms that already have an analysis artifact.
pub fn analyzed_stems(output_dir: &Path) -> Result<HashSet<String>, FormscanError> {
    let mut stems = HashSet::new();
    if !output_dir.is_dir() {
        return Ok(stems);
    }
    for entry in std::fs::read_dir(output_dir)? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if let Some(stem) = name.strip_suffix(artifacts::ANALYSIS_SUFFIX) {
            stems.insert(stem.to_string());
        }
    }
    Ok(stems)
}

/// Process every form in `input_dir` in order.
///
/// Forms with an existing analysis are skipped unless `force` is set. A
/// form that fails is recorded and the batch continues, except when the
/// output directory cannot be written, which ends the run.
pub fn run_batch(
    pipeline: &FieldExtractionPipeline<'_>,
    input_dir: &Path,
    force: bool,
) -> Result<BatchSummary, FormscanError> {
    let forms = discover_forms(input_dir)?;
    artifacts::ensure_output_dir(&pipeline.options().output_dir)?;
    let skip = if force {
        HashSet::new()
    } else {
        analyzed_stems(&pipeline.options().output_dir)?
    };
    tracing::info!(found = forms.len(), already_analyzed = skip.len(), "starting batch");
    run_forms(&forms, skip, |pdf| pipeline.process_form(pdf))
}

fn run_forms<F>(
    forms: &[PathBuf],
    mut skip: HashSet<String>,
    mut process: F,
) -> Result<BatchSummary, FormscanError>
where
    F: FnMut(&Path) -> Result<FormOutcome, FormscanError>,
{
    let mut summary = BatchSummary {
        found: forms.len(),
        ..BatchSummary::default()
    };

    for (i, pdf) in forms.iter().enumerate() {
        let stem = artifacts::form_stem(pdf);
        if skip.contains(&stem) {
            tracing::info!(file = %stem, "skipping already analyzed form");
            summary.skipped += 1;
            continue;
        }

        tracing::info!(file = %stem, index = i + 1, total = forms.len(), "processing");
        match process(pdf) {
            Ok(outcome) => {
                summary.processed += 1;
                if outcome.failures.iter().any(|f| f.section.is_some()) {
                    summary.degraded.push(stem.clone());
                }
                if !outcome.reconciled {
                    summary.not_reconciled.push(stem.clone());
                }
                skip.insert(stem);
            }
            Err(e) if e.ends_run() => {
                tracing::error!(file = %stem, error = %e, "output not writable, stopping batch");
                return Err(e);
            }
            Err(e) => {
                tracing::error!(file = %stem, error = %e, "form failed");
                summary.failed.push((stem, e.to_string()));
            }
        }
    }

    tracing::info!(
        found = summary.found,
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failed.len(),
        "batch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FormRecord;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"%PDF-1.4").unwrap();
    }

    fn outcome(name: &str, reconciled: bool) -> FormOutcome {
        FormOutcome {
            filename: name.into(),
            first_pass: FormRecord::new(),
            final_record: FormRecord::new(),
            reconciled,
            failures: vec![],
            analysis_path: PathBuf::new(),
        }
    }

    #[test]
    fn test_discover_orders_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["form_10.pdf", "form_2.pdf", "form_1.pdf", "form_x.pdf", "other.pdf", "form_3.txt"] {
            touch(dir.path(), name);
        }
        let forms = discover_forms(dir.path()).unwrap();
        let names: Vec<_> = forms.iter().map(|p| artifacts::form_stem(p)).collect();
        assert_eq!(names, vec!["form_1", "form_2", "form_10", "form_x"]);
    }

    #[test]
    fn test_missing_input_dir_is_error() {
        assert!(discover_forms(Path::new("/nonexistent/forms")).is_err());
    }

    #[test]
    fn test_analyzed_stems() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "form_1_analysis.json");
        touch(dir.path(), "form_2_first_pass.json");
        let stems = analyzed_stems(dir.path()).unwrap();
        assert_eq!(stems.len(), 1);
        assert!(stems.contains("form_1"));
        assert!(analyzed_stems(Path::new("/nonexistent")).unwrap().is_empty());
    }

    #[test]
    fn test_run_forms_skips_and_continues() {
        let forms: Vec<PathBuf> = ["form_1.pdf", "form_2.pdf", "form_3.pdf"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let skip: HashSet<String> = ["form_1".to_string()].into_iter().collect();
        let mut seen = Vec::new();

        let summary = run_forms(&forms, skip, |pdf| {
            let stem = artifacts::form_stem(pdf);
            seen.push(stem.clone());
            if stem == "form_2" {
                Err(FormscanError::Render {
                    path: pdf.to_path_buf(),
                    reason: "corrupt".into(),
                })
            } else {
                Ok(outcome(&stem, false))
            }
        })
        .unwrap();

        assert_eq!(seen, vec!["form_2", "form_3"]);
        assert_eq!(summary.found, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "form_2");
        assert_eq!(summary.not_reconciled, vec!["form_3"]);
    }

    #[test]
    fn test_run_forms_stops_on_output_error() {
        let forms: Vec<PathBuf> = ["form_1.pdf", "form_2.pdf"].iter().map(PathBuf::from).collect();
        let mut calls = 0;

        let result = run_forms(&forms, HashSet::new(), |pdf| {
            calls += 1;
            Err(FormscanError::OutputWrite {
                path: pdf.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        });

        assert!(matches!(result, Err(FormscanError::OutputWrite { .. })));
        assert_eq!(calls, 1);
    }
}
