//! PDF strategy: direct text layer with an optical-recognition fallback.
//!
//! The two stages form a small state machine driven by [`decide`]:
//!
//! ```text
//! TextLayer ──(non-blank text)──▶ Done(Text, method = layer)
//!     │
//!     ├──(blank text)──▶ Ocr ──▶ Done(Text, method = ocr) | Done(Failed)
//!     │
//!     └──(decode error)──▶ Done(Failed)
//! ```
//!
//! A decode error on the text layer means the buffer is not a readable PDF,
//! so rasterizing it is not attempted.

use super::{decode_blocking, ExtractError};
use crate::models::{ExtractionMethod, ExtractionOutcome, SourceDocument};
use crate::ocr::OcrEngine;

/// Separator placed between per-page texts.
pub const PAGE_SEPARATOR: &str = "\n";

/// What to do after reading the text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackDecision {
    AcceptLayer,
    RunOcr,
}

/// Fallback rule: only a blank (empty or whitespace-only) text layer
/// triggers optical recognition.
pub fn decide(layer_text: &str) -> FallbackDecision {
    if layer_text.trim().is_empty() {
        FallbackDecision::RunOcr
    } else {
        FallbackDecision::AcceptLayer
    }
}

enum Stage {
    TextLayer,
    Ocr { layer_pages: usize },
    Done(ExtractionOutcome),
}

pub(crate) async fn extract(doc: &SourceDocument, ocr: &dyn OcrEngine) -> ExtractionOutcome {
    let mut stage = Stage::TextLayer;
    loop {
        stage = match stage {
            Stage::TextLayer => match decode_blocking(doc, read_text_layer).await {
                Ok(pages) => {
                    let text = pages.join(PAGE_SEPARATOR);
                    match decide(&text) {
                        FallbackDecision::AcceptLayer => {
                            tracing::info!(
                                file = doc.filename(),
                                pages = pages.len(),
                                "extracted text layer"
                            );
                            Stage::Done(ExtractionOutcome::Text {
                                content: text,
                                page_count: Some(pages.len() as u32),
                                method: ExtractionMethod::Layer,
                            })
                        }
                        FallbackDecision::RunOcr => Stage::Ocr {
                            layer_pages: pages.len(),
                        },
                    }
                }
                Err(cause) => Stage::Done(ExtractionOutcome::Failed(cause)),
            },
            Stage::Ocr { layer_pages } => {
                tracing::warn!(
                    file = doc.filename(),
                    pages = layer_pages,
                    engine = ocr.name(),
                    "no selectable text found, running OCR"
                );
                match ocr.recognize_pdf(doc.bytes()).await {
                    Ok(output) => Stage::Done(ExtractionOutcome::Text {
                        content: output.text,
                        page_count: Some(output.page_count),
                        method: ExtractionMethod::Ocr,
                    }),
                    Err(e) => Stage::Done(ExtractionOutcome::Failed(format!(
                        "OCR fallback failed: {}",
                        e
                    ))),
                }
            }
            Stage::Done(outcome) => return outcome,
        };
    }
}

fn read_text_layer(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}
