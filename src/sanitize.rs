//! Cleanup and typed parsing of raw model completions.

use serde::de::DeserializeOwned;

use crate::models::{
    AnalysisTask, AnalysisValue, ComplianceResult, InconsistencyResult, RiskAssessment,
    SummaryResult,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty completion")]
    Empty,
    #[error("completion is not JSON: {0}")]
    NotJson(String),
    #[error("{task} result has the wrong shape: {message}")]
    Shape { task: AnalysisTask, message: String },
}

/// Remove a surrounding code fence (```` ```json ... ``` ````) if present.
///
/// Text outside a fence is returned trimmed and otherwise untouched.
pub fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse a raw completion into the structured result for `task`.
pub fn parse(raw: &str, task: AnalysisTask) -> Result<AnalysisValue, ParseError> {
    let json = strip_fences(raw);
    if json.is_empty() {
        return Err(ParseError::Empty);
    }
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ParseError::NotJson(e.to_string()))?;
    if !value.is_object() {
        return Err(shape(task, "expected a JSON object"));
    }

    match task {
        AnalysisTask::Summarize => {
            let result: SummaryResult = typed(value, task)?;
            if result.summary.trim().is_empty() {
                return Err(shape(task, "summary is empty"));
            }
            Ok(AnalysisValue::Summary(result))
        }
        AnalysisTask::RiskAnalyze => {
            let mut result: RiskAssessment = typed(value, task)?;
            result.risk_percentage = result.risk_percentage.map(clamp_score);
            let predictions = &mut result.risk_predictions;
            for score in [
                &mut predictions.cost,
                &mut predictions.timeline,
                &mut predictions.environmental,
            ] {
                *score = score.map(clamp_score);
            }
            Ok(AnalysisValue::Risk(result))
        }
        AnalysisTask::ComplianceCheck => {
            let mut result: ComplianceResult = typed(value, task)?;
            result.compliance_score = clamp_score(result.compliance_score);
            Ok(AnalysisValue::Compliance(result))
        }
        AnalysisTask::InconsistencyCheck => {
            typed::<InconsistencyResult>(value, task).map(AnalysisValue::Inconsistency)
        }
    }
}

fn typed<T: DeserializeOwned>(value: serde_json::Value, task: AnalysisTask) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|e| shape(task, e.to_string()))
}

fn shape(task: AnalysisTask, message: impl Into<String>) -> ParseError {
    ParseError::Shape {
        task,
        message: message.into(),
    }
}

/// Scores are percentages.
fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLIANCE: &str = r#"{"complianceScore": 72, "complianceFindings": [{"requirement": "Cost estimate", "status": "Met"}]}"#;

    #[test]
    fn fenced_and_bare_payloads_parse_identically() {
        let fenced = format!("```json\n{}\n```", COMPLIANCE);
        assert_eq!(
            parse(&fenced, AnalysisTask::ComplianceCheck).unwrap(),
            parse(COMPLIANCE, AnalysisTask::ComplianceCheck).unwrap()
        );
    }

    #[test]
    fn strips_fence_variants() {
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_fences("  ```JSON\n{\"a\":1}```  "), "{\"a\":1}");
        assert_eq!(strip_fences("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn distinguishes_failure_kinds() {
        assert_eq!(parse("```json\n```", AnalysisTask::Summarize), Err(ParseError::Empty));
        assert!(matches!(
            parse("Here is the summary: ...", AnalysisTask::Summarize),
            Err(ParseError::NotJson(_))
        ));
        assert!(matches!(
            parse(r#"{"summary": ""}"#, AnalysisTask::Summarize),
            Err(ParseError::Shape { task: AnalysisTask::Summarize, .. })
        ));
        assert!(matches!(
            parse(r#"{"complianceFindings": []}"#, AnalysisTask::ComplianceCheck),
            Err(ParseError::Shape { .. })
        ));
        assert!(matches!(
            parse("[1, 2]", AnalysisTask::InconsistencyCheck),
            Err(ParseError::Shape { .. })
        ));
    }

    #[test]
    fn empty_inconsistency_list_is_success() {
        let value = parse(r#"{"inconsistencies": []}"#, AnalysisTask::InconsistencyCheck).unwrap();
        assert_eq!(value, AnalysisValue::Inconsistency(InconsistencyResult::default()));
    }

    #[test]
    fn scores_are_clamped() {
        let value = parse(
            r#"{"riskPercentage": 140, "riskPredictions": {"cost": -5, "timeline": 55}}"#,
            AnalysisTask::RiskAnalyze,
        )
        .unwrap();
        let AnalysisValue::Risk(risk) = value else {
            panic!("expected risk result");
        };
        assert_eq!(risk.risk_percentage, Some(100.0));
        assert_eq!(risk.risk_predictions.cost, Some(0.0));
        assert_eq!(risk.risk_predictions.timeline, Some(55.0));
        assert_eq!(risk.risk_predictions.environmental, None);
    }
}
