pub mod analyzer;
pub mod artifacts;
pub mod batch;
pub mod compare;
pub mod config;
pub mod error;
pub mod extraction;
pub mod layout;
pub mod llm;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod retry;
pub mod schema;

use compare::report::{aggregate, Report};
use error::FormscanError;
use model::ComparisonRecord;
use schema::FieldCatalog;
use std::path::Path;

pub use pipeline::{FieldExtractionPipeline, FormOutcome, PipelineOptions};

/// Options for [`compare_analyzed_forms`].
#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    /// Compare every ground-truth file, not only the analyzed ones.
    pub all_files: bool,
}

/// Main comparison entry point: score the analysis artifacts in
/// `analyzed_dir` against a ground-truth file.
///
/// Ground truth is restricted to files with an artifact unless
/// `options.all_files` is set, in which case unanalyzed files count as
/// fully unmatched.
pub fn compare_analyzed_forms(
    ground_truth_path: &Path,
    analyzed_dir: &Path,
    catalog: &FieldCatalog,
    options: &CompareOptions,
) -> Result<(Vec<ComparisonRecord>, Report), FormscanError> {
    let mut rows = compare::ground_truth::load_ground_truth(ground_truth_path)?;
    if !options.all_files {
        let analyzed = compare::analyzed_filenames(analyzed_dir);
        rows = compare::restrict_to(rows, &analyzed);
        tracing::info!(
            rows = rows.len(),
            files = analyzed.len(),
            "ground truth restricted to analyzed files"
        );
    }

    let extracted = compare::load_artifacts(analyzed_dir, rows.iter().map(|r| r.filename.as_str()));
    let records = compare::compare(&rows, &extracted, catalog);
    let report = aggregate(&records);
    Ok((records, report))
}
