use formscan_core::artifacts;
use formscan_core::config::Settings;
use formscan_core::error::FormscanError;
use formscan_core::pipeline::prompts::Prompts;
use std::path::{Path, PathBuf};

use crate::commands::{load_schema, require_file, Clients};

/// Re-run the reconciliation pass from a saved first-pass checkpoint.
///
/// `input` is either the checkpoint itself or the form PDF, in which case
/// the checkpoint is looked up in the analyzed forms directory.
pub fn run(input: PathBuf, settings: &Settings) -> Result<(), FormscanError> {
    let (stem, checkpoint) = resolve_checkpoint(&input, &settings.analyzed_forms_dir)?;
    require_file(&checkpoint)?;

    let schema = load_schema(settings)?;
    let prompts = Prompts::load(&settings.prompt_path, &settings.post_process_prompt_path)?;
    let clients = Clients::from_env()?;

    let first_pass = artifacts::read_record(&checkpoint)?;
    let outcome = formscan_core::pipeline::reconcile(&clients.llm, &schema, &prompts, &first_pass);

    let analysis = artifacts::analysis_path(&settings.analyzed_forms_dir, &stem);
    artifacts::write_record(&analysis, &outcome.record)?;

    match &outcome.failure {
        Some(failure) => eprintln!(
            "Reconciliation failed, first pass kept: {failure}\nWritten to {}",
            analysis.display()
        ),
        None => eprintln!("Reconciled {stem}, written to {}", analysis.display()),
    }
    Ok(())
}

/// Analysis output is already reconciled and is never accepted as input.
fn resolve_checkpoint(input: &Path, analyzed_dir: &Path) -> Result<(String, PathBuf), FormscanError> {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if name.ends_with(artifacts::ANALYSIS_SUFFIX) {
        return Err(FormscanError::Config(format!(
            "{} is reconciled output; pass the form PDF or its {} checkpoint",
            input.display(),
            artifacts::FIRST_PASS_SUFFIX
        )));
    }
    match artifacts::stem_of_artifact(input) {
        Some(stem) => Ok((stem, input.to_path_buf())),
        None => {
            let stem = artifacts::form_stem(input);
            let checkpoint = artifacts::first_pass_path(analyzed_dir, &stem);
            Ok((stem, checkpoint))
        }
    }
}
