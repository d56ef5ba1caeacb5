//! Free-form questions about a stored report.
//!
//! The question and the report's retained text go to the inference endpoint
//! as ordinary chat (no JSON response format).

use anyhow::{bail, Result};

use crate::inference::{ChatMessage, CompletionBackend, CompletionRequest};
use crate::models::ReportAggregate;
use crate::prompts;

pub async fn ask_about_report(
    backend: &dyn CompletionBackend,
    report: &ReportAggregate,
    question: &str,
) -> Result<String> {
    let question = question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }
    if report.full_text.trim().is_empty() {
        bail!("report {} has no stored text to answer from", report.id);
    }

    let request = CompletionRequest {
        messages: vec![ChatMessage::user(prompts::report_question(
            &report.full_text,
            question,
        ))],
        json_mode: false,
    };
    tracing::debug!(report = %report.id, "asking about report");
    let answer = backend.complete(request).await?;
    let answer = answer.trim();
    if answer.is_empty() {
        bail!("inference endpoint returned an empty answer");
    }
    Ok(answer.to_string())
}
