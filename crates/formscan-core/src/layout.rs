use crate::error::FormscanError;
use crate::model::{SectionBand, SectionLayout};
use std::collections::HashSet;
use std::path::Path;

/// Load a section layout from a JSON file.
pub fn load_layout(path: &Path) -> Result<SectionLayout, FormscanError> {
    let content = std::fs::read_to_string(path).map_err(|e| FormscanError::ConfigLoad {
        what: "section layout",
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let layout: SectionLayout =
        serde_json::from_str(&content).map_err(|e| FormscanError::ConfigLoad {
            what: "section layout",
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_layout(&layout)?;
    Ok(layout)
}

/// Parse a section layout from a JSON string (no file path context).
pub fn parse_layout_str(json: &str) -> Result<SectionLayout, FormscanError> {
    let layout: SectionLayout = serde_json::from_str(json)?;
    validate_layout(&layout)?;
    Ok(layout)
}

/// Validate that a layout is well-formed.
///
/// Section names become file names and record keys, so they must be
/// non-empty and unique.
pub fn validate_layout(layout: &SectionLayout) -> Result<(), FormscanError> {
    if layout.sections.is_empty() {
        return Err(FormscanError::LayoutInvalid(
            "sections must not be empty".into(),
        ));
    }

    let mut seen = HashSet::new();
    for section in &layout.sections {
        let name = section.name.trim();
        if name.is_empty() {
            return Err(FormscanError::LayoutInvalid(
                "section name must not be empty".into(),
            ));
        }
        if name.contains(['/', '\\']) {
            return Err(FormscanError::LayoutInvalid(format!(
                "section name '{}' must not contain path separators",
                section.name
            )));
        }
        if !seen.insert(name) {
            return Err(FormscanError::LayoutInvalid(format!(
                "duplicate section name '{}'",
                section.name
            )));
        }
    }

    if layout.dpi == Some(0) {
        return Err(FormscanError::LayoutInvalid("dpi must be positive".into()));
    }

    Ok(())
}

/// Check that the layout coordinates were authored at the render DPI.
///
/// A layout without a declared DPI cannot be checked; that is logged and
/// accepted.
pub fn check_render_dpi(layout: &SectionLayout, render_dpi: u32) -> Result<(), FormscanError> {
    match layout.dpi {
        Some(dpi) if dpi != render_dpi => Err(FormscanError::LayoutInvalid(format!(
            "layout coordinates are authored at {dpi} DPI but pages are rendered at {render_dpi} DPI"
        ))),
        Some(_) => Ok(()),
        None => {
            tracing::warn!(
                render_dpi,
                "section layout does not declare its DPI; assuming coordinates match the render DPI"
            );
            Ok(())
        }
    }
}

/// Compute the vertical bands for a page of the given height.
///
/// Sections are ordered by `y_start`; each band ends where the next one
/// starts, the last at the page bottom. Bands that end up empty (including
/// ones starting below the page) are skipped with a warning.
pub fn compute_bands(layout: &SectionLayout, page_height: u32) -> Vec<SectionBand> {
    let mut sorted: Vec<_> = layout.sections.iter().collect();
    sorted.sort_by_key(|s| s.y_start);

    let mut bands = Vec::with_capacity(sorted.len());
    for (i, section) in sorted.iter().enumerate() {
        let y_end = sorted
            .get(i + 1)
            .map(|next| next.y_start)
            .unwrap_or(page_height)
            .min(page_height);

        if section.y_start >= y_end {
            tracing::warn!(
                section = %section.name,
                y_start = section.y_start,
                y_end,
                "skipping section with invalid coordinates"
            );
            continue;
        }

        bands.push(SectionBand {
            name: section.name.clone(),
            y_start: section.y_start,
            y_end,
        });
    }

    bands
}
