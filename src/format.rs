//! Media-type classification.
//!
//! Maps a declared content-type to the extraction strategy that handles it.
//! Classification is pure: nothing is decoded here, so unsupported uploads
//! are rejected before any extraction work happens.

use std::path::Path;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Extraction strategy selected for a media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStrategy {
    /// Text layer first, optical recognition as fallback.
    Pdf,
    WordProcessor,
    Spreadsheet,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported content-type: {0}")]
pub struct UnsupportedFormat(pub String);

/// Classify a declared media type. Parameters (`; charset=...`) and case
/// are ignored.
pub fn classify(media_type: &str) -> Result<FormatStrategy, UnsupportedFormat> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        MIME_PDF => Ok(FormatStrategy::Pdf),
        MIME_DOCX => Ok(FormatStrategy::WordProcessor),
        MIME_XLSX => Ok(FormatStrategy::Spreadsheet),
        _ => Err(UnsupportedFormat(media_type.to_string())),
    }
}

/// Guess the media type from a file extension. Used by the CLI when no
/// `--media-type` is given; unknown extensions map to `application/octet-stream`.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => MIME_PDF,
        Some("docx") => MIME_DOCX,
        Some("xlsx") => MIME_XLSX,
        _ => "application/octet-stream",
    }
}
