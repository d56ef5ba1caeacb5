//! All-or-nothing merge of task results into a [`ReportAggregate`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    AnalysisTask, AnalysisValue, ExtractionMethod, ReportAggregate, ReportStatus, TimelineEvent,
};
use crate::orchestrator::{AnalysisOutcome, TaskFailure};

/// At least one requested task did not succeed, or nothing was requested.
/// No report was built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe(.failures))]
pub struct AssemblyError {
    pub failures: Vec<(AnalysisTask, TaskFailure)>,
}

impl AssemblyError {
    pub fn failed_tasks(&self) -> Vec<AnalysisTask> {
        self.failures.iter().map(|(task, _)| *task).collect()
    }
}

fn describe(failures: &[(AnalysisTask, TaskFailure)]) -> String {
    if failures.is_empty() {
        return "analysis aborted, no tasks were requested".to_string();
    }
    let mut message = format!("analysis aborted, {} task(s) failed", failures.len());
    for (task, failure) in failures {
        message.push_str(&format!("; {}: {}", task, failure));
    }
    message
}

pub struct ReportAssembler {
    initial_status: ReportStatus,
}

impl ReportAssembler {
    pub fn new(initial_status: ReportStatus) -> Self {
        Self { initial_status }
    }

    /// Build a report from the outcomes of `requested`.
    ///
    /// Every requested task must have a `Success` outcome; a missing entry
    /// counts as [`TaskFailure::Aborted`]. An empty `requested` set is an
    /// error with no failures listed. Outcomes for tasks outside
    /// `requested` are ignored. Source-level fields (`media_type`,
    /// `source_sha256`, `page_count`, `full_text`) are left empty for the
    /// pipeline to fill in.
    pub fn assemble(
        &self,
        filename: &str,
        method: ExtractionMethod,
        requested: &BTreeSet<AnalysisTask>,
        mut outcomes: BTreeMap<AnalysisTask, AnalysisOutcome>,
    ) -> Result<ReportAggregate, AssemblyError> {
        if requested.is_empty() {
            tracing::warn!(file = filename, "report assembly aborted, no tasks requested");
            return Err(AssemblyError {
                failures: Vec::new(),
            });
        }
        let mut values = Vec::with_capacity(requested.len());
        let mut failures = Vec::new();
        for &task in requested {
            match outcomes.remove(&task) {
                Some(AnalysisOutcome::Success(value)) => values.push(value),
                Some(AnalysisOutcome::Failure(failure)) => failures.push((task, failure)),
                None => failures.push((task, TaskFailure::Aborted)),
            }
        }
        if !failures.is_empty() {
            let err = AssemblyError { failures };
            tracing::warn!(file = filename, failed = ?err.failed_tasks(), "report assembly aborted");
            return Err(err);
        }

        let created_at = Utc::now();
        let mut report = ReportAggregate {
            id: Uuid::new_v4().to_string(),
            original_filename: filename.to_string(),
            media_type: String::new(),
            source_sha256: String::new(),
            extraction_method: method,
            page_count: None,
            status: self.initial_status,
            summary: None,
            risk: None,
            compliance: None,
            inconsistency_findings: Vec::new(),
            full_text: String::new(),
            timeline: vec![TimelineEvent {
                event_name: "Report Generated".to_string(),
                description: format!(
                    "Analysis completed for {} ({} extraction)",
                    filename, method
                ),
                created_at,
            }],
            created_at,
        };

        for value in values {
            match value {
                AnalysisValue::Summary(s) => report.summary = Some(s.summary),
                AnalysisValue::Risk(r) => report.risk = Some(r),
                AnalysisValue::Compliance(c) => report.compliance = Some(c),
                AnalysisValue::Inconsistency(i) => report.inconsistency_findings = i.inconsistencies,
            }
        }
        Ok(report)
    }
}
