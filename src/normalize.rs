//! Conversion of extraction output into the single bounded text payload
//! every analysis task receives.
//!
//! Truncation keeps the first `max_chars` characters (not bytes), so it is
//! deterministic and never splits a UTF-8 sequence.

use crate::models::{ExtractionOutcome, NormalizedPayload};

/// Default character budget for the normalized payload.
pub const DEFAULT_MAX_CHARS: usize = 15_000;

/// The extraction produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmptyContent {
    #[error("unsupported content-type: {0}")]
    Unsupported(String),
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("no readable text could be extracted")]
    Blank,
}

pub fn normalize(
    outcome: &ExtractionOutcome,
    max_chars: usize,
) -> Result<NormalizedPayload, EmptyContent> {
    let text = match outcome {
        ExtractionOutcome::Text { content, .. } => content.clone(),
        ExtractionOutcome::TabularData(rows) => {
            if rows.is_empty() {
                return Err(EmptyContent::Blank);
            }
            serde_json::to_string(rows).map_err(|e| EmptyContent::ExtractionFailed(e.to_string()))?
        }
        ExtractionOutcome::Unsupported(media_type) => {
            return Err(EmptyContent::Unsupported(media_type.clone()));
        }
        ExtractionOutcome::Failed(cause) => {
            return Err(EmptyContent::ExtractionFailed(cause.clone()));
        }
    };

    let (text, truncated) = truncate_chars(text, max_chars);
    if text.trim().is_empty() {
        return Err(EmptyContent::Blank);
    }
    if truncated {
        tracing::debug!(max_chars, "normalized payload truncated");
    }
    Ok(NormalizedPayload::new(text, truncated))
}

/// Keep at most the first `max_chars` characters.
fn truncate_chars(mut text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_end, _)) => {
            text.truncate(byte_end);
            (text, true)
        }
        None => (text, false),
    }
}
