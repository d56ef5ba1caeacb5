//! Instruction templates for each analysis task.
//!
//! Every template embeds the normalized document text at `{content}` and
//! describes the exact JSON object the model must return. The shapes here
//! match the structs in [`crate::models`] field for field.

use crate::models::AnalysisTask;

/// System message shared by all structured tasks.
pub const SYSTEM_PROMPT: &str = "You are an analyst reviewing Detailed Project Reports for \
public infrastructure projects. Respond only with a single valid JSON object. Do not add \
commentary or markdown.";

const SUMMARIZE_TEMPLATE: &str = r#"Summarize the following project report in one or two paragraphs.
Cover the project's purpose, scope, location, estimated cost, and timeline where stated.

Return JSON of the form:
{"summary": "<plain text summary>"}

Report:
{content}"#;

const RISK_TEMPLATE: &str = r#"Analyze the following project report for risk.

Return JSON of the form:
{
  "riskPercentage": <overall risk 0-100>,
  "clauses": [{"title": "<clause name>", "excerpt": "<quoted text>", "riskLevel": "Low|Medium|High"}],
  "financials": [{"label": "<what the figure is>", "amount": <number or string>, "currency": "<code>"}],
  "entities": {
    "contractors": ["<name>"],
    "agencies": ["<name>"],
    "locations": ["<place>"],
    "people": ["<name>"]
  },
  "riskPredictions": {"cost": <0-100>, "timeline": <0-100>, "environmental": <0-100>}
}
Use empty arrays when nothing applies.

Report:
{content}"#;

const COMPLIANCE_TEMPLATE: &str = r#"Check the following project report against standard DPR requirements:
executive summary, technical feasibility, cost estimate, financial analysis, implementation
schedule, environmental and social impact assessment, and statutory clearances.

Return JSON of the form:
{
  "complianceScore": <0-100>,
  "complianceFindings": [{"requirement": "<requirement>", "status": "Met|Partially Met|Not Met", "details": "<evidence>"}]
}

Report:
{content}"#;

const INCONSISTENCY_TEMPLATE: &str = r#"Find internal inconsistencies in the following project report:
figures that disagree between sections, conflicting dates, mismatched totals, or contradictory
statements.

Return JSON of the form:
{"inconsistencies": [{"finding": "<what conflicts>", "severity": "Low|Medium|High", "details": "<where>"}]}
Return {"inconsistencies": []} if none are found.

Report:
{content}"#;

/// Raw template for a task, with the `{content}` placeholder intact.
pub fn template(task: AnalysisTask) -> &'static str {
    match task {
        AnalysisTask::Summarize => SUMMARIZE_TEMPLATE,
        AnalysisTask::RiskAnalyze => RISK_TEMPLATE,
        AnalysisTask::ComplianceCheck => COMPLIANCE_TEMPLATE,
        AnalysisTask::InconsistencyCheck => INCONSISTENCY_TEMPLATE,
    }
}

/// Instruction for `task` with the document text embedded.
pub fn render(task: AnalysisTask, content: &str) -> String {
    template(task).replace("{content}", content)
}

/// Prompt for a free-form question about a stored report.
pub fn report_question(report_text: &str, question: &str) -> String {
    format!(
        "Answer the question using only the project report below. If the report does not \
         contain the answer, say so.\n\nReport:\n{}\n\nQuestion: {}",
        report_text, question
    )
}
