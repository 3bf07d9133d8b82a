pub mod pdftoppm;
pub mod sections;

use crate::error::FormscanError;
use image::RgbImage;
use std::path::Path;

/// Trait for PDF page rendering backends.
///
/// Rendering at `dpi` scales the 72-DPI PDF coordinate space by `dpi / 72`;
/// section layouts are expressed in that scaled pixel space.
pub trait PageRenderer: Send + Sync {
    /// Render the first page of the PDF into an RGB pixel buffer.
    fn render_first_page(&self, pdf_path: &Path, dpi: u32) -> Result<RgbImage, FormscanError>;

    /// Name of this rendering backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
