use crate::error::FormscanError;
use crate::extraction::PageRenderer;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::process::Command;

const PROGRAM: &str = "pdftoppm";

/// Page rendering backend using pdftoppm (from poppler-utils).
pub struct PdftoppmRenderer {
    program: PathBuf,
}

impl PdftoppmRenderer {
    pub fn new() -> Self {
        Self::with_program(PROGRAM)
    }

    /// Use a specific pdftoppm binary instead of the one on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        PdftoppmRenderer {
            program: program.into(),
        }
    }

    /// Check if pdftoppm can be run.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }

    /// Fail early with [`FormscanError::PdftoppmNotFound`] when pdftoppm
    /// cannot be run.
    pub fn ensure_available(&self) -> Result<(), FormscanError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(FormscanError::PdftoppmNotFound)
        }
    }
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer for PdftoppmRenderer {
    fn render_first_page(&self, pdf_path: &Path, dpi: u32) -> Result<RgbImage, FormscanError> {
        if !pdf_path.is_file() {
            return Err(FormscanError::Render {
                path: pdf_path.to_path_buf(),
                reason: "file not found".into(),
            });
        }

        let tmpdir = tempfile::tempdir()?;
        let prefix = tmpdir.path().join("page");

        // -singlefile writes exactly <prefix>.png for the one requested page.
        let output = Command::new(&self.program)
            .arg("-r")
            .arg(dpi.to_string())
            .args(["-f", "1", "-l", "1", "-png", "-singlefile"])
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    FormscanError::PdftoppmNotFound
                } else {
                    FormscanError::Render {
                        path: pdf_path.to_path_buf(),
                        reason: format!("pdftoppm failed: {e}"),
                    }
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(FormscanError::PdftoppmFailed { code, stderr });
        }

        let png_path = prefix.with_extension("png");
        let page = image::open(&png_path)
            .map_err(|e| FormscanError::Render {
                path: pdf_path.to_path_buf(),
                reason: format!("rendered page could not be decoded: {e}"),
            })?
            .to_rgb8();

        tracing::debug!(
            dpi,
            width = page.width(),
            height = page.height(),
            "rendered first page"
        );
        Ok(page)
    }

    fn backend_name(&self) -> &str {
        "pdftoppm"
    }
}
