//! Multi-format text extraction for uploaded documents (PDF, DOCX, XLSX).
//!
//! [`TextExtractor::extract`] classifies the declared media type, runs the
//! matching strategy, and always returns an [`ExtractionOutcome`]. Decoder
//! errors and decoder panics become [`ExtractionOutcome::Failed`]; nothing
//! escapes as an unhandled fault.
//!
//! | Media type | Strategy | Outcome |
//! |------------|----------|---------|
//! | `application/pdf` | text layer, OCR fallback ([`pdf`]) | `Text` (`layer` / `ocr`) |
//! | DOCX | `word/document.xml` runs ([`ooxml`]) | `Text` (`docx`) |
//! | XLSX | first worksheet ([`ooxml`]) | `TabularData` |
//! | anything else | none | `Unsupported` |

pub mod ooxml;
pub mod pdf;

use std::sync::Arc;

use crate::format::{classify, FormatStrategy, UnsupportedFormat};
use crate::models::{ExtractionMethod, ExtractionOutcome, SourceDocument};
use crate::ocr::OcrEngine;

/// Decoder error raised inside a single strategy.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Runs the per-format extraction strategies.
pub struct TextExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl TextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    pub async fn extract(&self, doc: &SourceDocument) -> ExtractionOutcome {
        let strategy = match classify(doc.media_type()) {
            Ok(strategy) => strategy,
            Err(UnsupportedFormat(media_type)) => {
                return ExtractionOutcome::Unsupported(media_type);
            }
        };

        tracing::debug!(
            file = doc.filename(),
            bytes = doc.bytes().len(),
            ?strategy,
            "extracting"
        );

        let outcome = match strategy {
            FormatStrategy::Pdf => pdf::extract(doc, self.ocr.as_ref()).await,
            FormatStrategy::WordProcessor => {
                match decode_blocking(doc, ooxml::extract_docx_text).await {
                    Ok(content) => ExtractionOutcome::Text {
                        content,
                        page_count: None,
                        method: ExtractionMethod::Docx,
                    },
                    Err(cause) => ExtractionOutcome::Failed(cause),
                }
            }
            FormatStrategy::Spreadsheet => {
                match decode_blocking(doc, ooxml::extract_first_sheet_rows).await {
                    Ok(rows) => ExtractionOutcome::TabularData(rows),
                    Err(cause) => ExtractionOutcome::Failed(cause),
                }
            }
        };

        if let ExtractionOutcome::Failed(cause) = &outcome {
            tracing::warn!(file = doc.filename(), %cause, "extraction failed");
        }
        outcome
    }
}

/// Run a CPU-bound decoder off the async runtime. A panicking decoder is
/// reported as a failure cause like any other decode error.
pub(crate) async fn decode_blocking<T, F>(doc: &SourceDocument, decode: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce(&[u8]) -> Result<T, ExtractError> + Send + 'static,
{
    let bytes = doc.shared_bytes();
    match tokio::task::spawn_blocking(move || decode(&bytes)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(join_err) => Err(format!("decoder crashed: {}", join_err)),
    }
}
