use formscan_core::config::Settings;
use formscan_core::error::FormscanError;
use formscan_core::extraction::sections::split_page;
use formscan_core::extraction::PageRenderer;
use formscan_core::layout::check_render_dpi;
use std::path::PathBuf;

use crate::commands::{load_layout, renderer, require_file};
use crate::output;

/// Render a form and save its section crops, without OCR.
pub fn run(pdf_file: PathBuf, out_dir: PathBuf, settings: &Settings) -> Result<(), FormscanError> {
    require_file(&pdf_file)?;
    let layout = load_layout(settings)?;
    check_render_dpi(&layout, settings.dpi)?;

    let page = renderer()?.render_first_page(&pdf_file, settings.dpi)?;
    let sections = split_page(&page, &layout, &out_dir)?;

    println!("{}", output::table::format_sections(&sections));
    Ok(())
}
