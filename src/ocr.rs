//! Optical character recognition for PDFs without a text layer.
//!
//! [`OcrEngine`] is the seam the extractor calls when direct text extraction
//! comes back empty. The shipped engine, [`TesseractOcr`], renders every page
//! with `pdftoppm` (Poppler) and runs the `tesseract` binary on each image.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;

use crate::config::ExtractionConfig;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("external tool not found: {0}")]
    ToolNotFound(String),

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text recognized from a rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrOutput {
    pub text: String,
    pub page_count: u32,
}

/// An engine that derives text from the page images of a PDF buffer.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short engine identifier used in logs (e.g. `"tesseract"`).
    fn name(&self) -> &str;

    /// Recognize text on every page of the PDF in `bytes`.
    async fn recognize_pdf(&self, bytes: &[u8]) -> Result<OcrOutput, OcrError>;
}

/// Tesseract OCR via command-line, with pages rasterized by `pdftoppm`.
pub struct TesseractOcr {
    pdftoppm_bin: String,
    tesseract_bin: String,
    language: String,
    dpi: u32,
}

impl TesseractOcr {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            pdftoppm_bin: config.pdftoppm_bin.clone(),
            tesseract_bin: config.tesseract_bin.clone(),
            language: config.ocr_language.clone(),
            dpi: config.ocr_dpi,
        }
    }

    async fn render_pages(&self, pdf_path: &Path, out_dir: &Path) -> Result<(), OcrError> {
        let output = Command::new(&self.pdftoppm_bin)
            .args(["-png", "-r", &self.dpi.to_string()])
            .arg(pdf_path)
            .arg(out_dir.join("page"))
            .output()
            .await;
        command_stdout(output, &self.pdftoppm_bin, "pdftoppm failed").map(|_| ())
    }

    async fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new(&self.tesseract_bin)
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .await;
        command_stdout(output, &self.tesseract_bin, "tesseract failed")
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize_pdf(&self, bytes: &[u8]) -> Result<OcrOutput, OcrError> {
        let temp_dir = TempDir::new()?;
        let pdf_path = temp_dir.path().join("input.pdf");
        tokio::fs::write(&pdf_path, bytes).await?;

        self.render_pages(&pdf_path, temp_dir.path()).await?;

        let images = page_images(temp_dir.path())?;
        if images.is_empty() {
            return Err(OcrError::Failed("pdftoppm rendered no pages".to_string()));
        }

        let mut pages = Vec::with_capacity(images.len());
        for image in &images {
            let text = self.run_tesseract(image).await?;
            tracing::debug!(image = %image.display(), chars = text.len(), "page recognized");
            pages.push(text);
        }

        Ok(OcrOutput {
            text: pages.join("\n"),
            page_count: images.len() as u32,
        })
    }
}

/// Map a finished command to its stdout, or the matching [`OcrError`].
fn command_stdout(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
    error_prefix: &str,
) -> Result<String, OcrError> {
    match result {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(OcrError::Failed(format!("{}: {}", error_prefix, stderr.trim())))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(OcrError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(OcrError::Io(e)),
    }
}

/// Rendered page images in page order. pdftoppm zero-pads page numbers
/// based on the page count (`page-1.png`, `page-01.png`, ...).
fn page_images(dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
    let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let name = path.file_name()?.to_str()?;
            let number = name
                .strip_prefix("page-")?
                .strip_suffix(".png")?
                .parse::<u32>()
                .ok()?;
            Some((number, path))
        })
        .collect();
    pages.sort_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}
