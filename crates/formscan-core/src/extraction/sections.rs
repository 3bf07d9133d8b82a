use crate::error::FormscanError;
use crate::layout::compute_bands;
use crate::model::{SectionImage, SectionLayout};
use image::{imageops, RgbImage};
use std::path::Path;

/// Crop a rendered page into the layout's sections and save each as
/// `<out_dir>/<name>.png`.
///
/// Sections come back in ascending `y_start` order. Invalid bands are
/// skipped (see [`compute_bands`]).
pub fn split_page(
    page: &RgbImage,
    layout: &SectionLayout,
    out_dir: &Path,
) -> Result<Vec<SectionImage>, FormscanError> {
    std::fs::create_dir_all(out_dir)?;
    let (width, height) = page.dimensions();
    let bands = compute_bands(layout, height);

    let mut sections = Vec::with_capacity(bands.len());
    for band in bands {
        let path = out_dir.join(format!("{}.png", band.name));
        let crop = imageops::crop_imm(page, 0, band.y_start, width, band.height()).to_image();
        crop.save(&path)?;

        tracing::debug!(
            section = %band.name,
            y_start = band.y_start,
            y_end = band.y_end,
            path = %path.display(),
            "saved section crop"
        );

        sections.push(SectionImage {
            name: band.name,
            y_start: band.y_start,
            y_end: band.y_end,
            path,
        });
    }

    tracing::info!(count = sections.len(), width, height, "page split into sections");
    Ok(sections)
}
