use formscan_core::config::Settings;
use formscan_core::error::FormscanError;
use std::path::PathBuf;

use crate::commands::{require_file, with_pipeline};
use crate::output;

pub fn run(
    pdf_file: PathBuf,
    settings: &Settings,
    keep_sections: bool,
    output_format: &str,
) -> Result<(), FormscanError> {
    require_file(&pdf_file)?;
    let outcome = with_pipeline(settings, keep_sections, |pipeline| {
        pipeline.process_form(&pdf_file)
    })?;

    let output_str = match output_format {
        "json" => serde_json::to_string_pretty(&outcome)?,
        _ => output::table::format_outcome(&outcome),
    };
    println!("{output_str}");
    Ok(())
}
