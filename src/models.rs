//! Core data models used throughout the analysis pipeline.
//!
//! These types represent the uploaded document, the intermediate values that
//! flow between pipeline stages, and the report record that survives an
//! invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// One row of spreadsheet data, keyed by header cell.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// An uploaded file held in memory for the duration of one invocation.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    bytes: Arc<[u8]>,
    media_type: String,
    filename: String,
}

impl SourceDocument {
    pub fn new(
        bytes: impl Into<Arc<[u8]>>,
        media_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
            filename: filename.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the buffer, for moving into blocking decoder tasks.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Hex-encoded SHA-256 of the raw bytes.
    pub fn sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

/// Which strategy produced the extracted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Embedded PDF text layer.
    Layer,
    /// Optical recognition over rendered PDF pages.
    Ocr,
    /// Word-processor document body.
    Docx,
    /// First worksheet of a spreadsheet.
    Xlsx,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Layer => "layer",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::Docx => "docx",
            ExtractionMethod::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running a [`TextExtractor`](crate::extract::TextExtractor) over a document.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Text {
        content: String,
        page_count: Option<u32>,
        method: ExtractionMethod,
    },
    TabularData(Vec<Row>),
    Unsupported(String),
    Failed(String),
}

impl ExtractionOutcome {
    /// The producing strategy, for outcomes that carry content.
    pub fn method(&self) -> Option<ExtractionMethod> {
        match self {
            ExtractionOutcome::Text { method, .. } => Some(*method),
            ExtractionOutcome::TabularData(_) => Some(ExtractionMethod::Xlsx),
            ExtractionOutcome::Unsupported(_) | ExtractionOutcome::Failed(_) => None,
        }
    }

    pub fn page_count(&self) -> Option<u32> {
        match self {
            ExtractionOutcome::Text { page_count, .. } => *page_count,
            _ => None,
        }
    }
}

/// The bounded text fed to every analysis task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPayload {
    text: String,
    truncated: bool,
}

impl NormalizedPayload {
    pub(crate) fn new(text: String, truncated: bool) -> Self {
        Self { text, truncated }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Whether the character cap cut the source text.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// One of the independent analyses run over the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisTask {
    Summarize,
    #[serde(rename = "risk")]
    RiskAnalyze,
    #[serde(rename = "compliance")]
    ComplianceCheck,
    #[serde(rename = "inconsistency")]
    InconsistencyCheck,
}

impl AnalysisTask {
    pub const ALL: [AnalysisTask; 4] = [
        AnalysisTask::Summarize,
        AnalysisTask::RiskAnalyze,
        AnalysisTask::ComplianceCheck,
        AnalysisTask::InconsistencyCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisTask::Summarize => "summarize",
            AnalysisTask::RiskAnalyze => "risk",
            AnalysisTask::ComplianceCheck => "compliance",
            AnalysisTask::InconsistencyCheck => "inconsistency",
        }
    }
}

impl fmt::Display for AnalysisTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "summarize" | "summary" => Ok(AnalysisTask::Summarize),
            "risk" | "risk-analyze" => Ok(AnalysisTask::RiskAnalyze),
            "compliance" | "compliance-check" => Ok(AnalysisTask::ComplianceCheck),
            "inconsistency" | "inconsistency-check" => Ok(AnalysisTask::InconsistencyCheck),
            other => Err(format!(
                "unknown analysis task '{}'. Must be summarize, risk, compliance, or inconsistency",
                other
            )),
        }
    }
}

// ============ Structured task results ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
}

/// Output of the risk analysis task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    #[serde(default)]
    pub risk_percentage: Option<f64>,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(default)]
    pub financials: Vec<FinancialFigure>,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub risk_predictions: RiskPredictions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub risk_level: Option<String>,
}

/// A monetary figure mentioned in the document. `amount` is kept as the
/// model produced it (number or formatted string).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialFigure {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub amount: serde_json::Value,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub contractors: Vec<String>,
    #[serde(default)]
    pub agencies: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub people: Vec<String>,
}

/// Per-category risk scores on a 0-100 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskPredictions {
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub timeline: Option<f64>,
    #[serde(default)]
    pub environmental: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResult {
    pub compliance_score: f64,
    #[serde(default)]
    pub compliance_findings: Vec<ComplianceFinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFinding {
    #[serde(default)]
    pub requirement: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InconsistencyResult {
    #[serde(default)]
    pub inconsistencies: Vec<InconsistencyFinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InconsistencyFinding {
    #[serde(default)]
    pub finding: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// A parsed, shape-checked task result.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisValue {
    Summary(SummaryResult),
    Risk(RiskAssessment),
    Compliance(ComplianceResult),
    Inconsistency(InconsistencyResult),
}

impl AnalysisValue {
    pub fn task(&self) -> AnalysisTask {
        match self {
            AnalysisValue::Summary(_) => AnalysisTask::Summarize,
            AnalysisValue::Risk(_) => AnalysisTask::RiskAnalyze,
            AnalysisValue::Compliance(_) => AnalysisTask::ComplianceCheck,
            AnalysisValue::Inconsistency(_) => AnalysisTask::InconsistencyCheck,
        }
    }
}

// ============ Report ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    #[serde(rename = "In-Progress")]
    InProgress,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::InProgress => "In-Progress",
            ReportStatus::Completed => "Completed",
            ReportStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "inprogress" => Ok(ReportStatus::InProgress),
            "completed" => Ok(ReportStatus::Completed),
            "failed" => Ok(ReportStatus::Failed),
            _ => Err(format!(
                "unknown report status '{}'. Must be In-Progress, Completed, or Failed",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub event_name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// The merged analysis record produced once per successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAggregate {
    pub id: String,
    pub original_filename: String,
    pub media_type: String,
    pub source_sha256: String,
    pub extraction_method: ExtractionMethod,
    pub page_count: Option<u32>,
    pub status: ReportStatus,
    pub summary: Option<String>,
    pub risk: Option<RiskAssessment>,
    pub compliance: Option<ComplianceResult>,
    pub inconsistency_findings: Vec<InconsistencyFinding>,
    pub full_text: String,
    pub timeline: Vec<TimelineEvent>,
    pub created_at: DateTime<Utc>,
}
