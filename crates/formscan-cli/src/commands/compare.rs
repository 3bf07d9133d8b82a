use formscan_core::compare::export::write_sheets;
use formscan_core::config::Settings;
use formscan_core::error::FormscanError;
use formscan_core::CompareOptions;
use std::path::PathBuf;

use crate::commands::{load_schema, require_file};
use crate::output;

pub struct CompareArgs {
    pub ground_truth: Option<PathBuf>,
    pub analyzed_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub all_files: bool,
}

pub fn run(args: CompareArgs, settings: &Settings, output_format: &str) -> Result<(), FormscanError> {
    let ground_truth = args
        .ground_truth
        .unwrap_or_else(|| settings.master_data_path.clone());
    let analyzed_dir = args
        .analyzed_dir
        .unwrap_or_else(|| settings.analyzed_forms_dir.clone());
    let out_dir = args
        .out_dir
        .unwrap_or_else(|| settings.comparison_results_dir.clone());
    require_file(&ground_truth)?;

    let catalog = load_schema(settings)?.catalog();
    let options = CompareOptions {
        all_files: args.all_files,
    };
    let (records, report) =
        formscan_core::compare_analyzed_forms(&ground_truth, &analyzed_dir, &catalog, &options)?;
    let paths = write_sheets(&out_dir, &records, &report)?;

    let output_str = match output_format {
        "json" => serde_json::to_string_pretty(&report)?,
        _ => output::table::format_report(&report),
    };
    println!("{output_str}");
    eprintln!(
        "Compared {} field(s), report written to {}",
        records.len(),
        paths.report.display()
    );
    Ok(())
}
