//! End-to-end analysis of one uploaded document.
//!
//! ```text
//! SourceDocument ─▶ classify ─▶ extract ─▶ normalize ─▶ analyze (concurrent) ─▶ assemble
//! ```
//!
//! Each stage finishes before the next begins. Caller-input problems
//! (unsupported type, nothing readable) stop the run before any inference
//! call is made.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::assemble::{AssemblyError, ReportAssembler};
use crate::config::Config;
use crate::extract::TextExtractor;
use crate::format::{classify, UnsupportedFormat};
use crate::inference::CompletionBackend;
use crate::models::{AnalysisTask, ExtractionOutcome, NormalizedPayload, ReportAggregate, SourceDocument};
use crate::normalize::{normalize, EmptyContent};
use crate::ocr::OcrEngine;
use crate::orchestrator::AnalysisOrchestrator;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),
    #[error("extraction failed: {0}")]
    ExtractionFailure(String),
    #[error(transparent)]
    EmptyContent(EmptyContent),
    #[error("no analysis tasks requested")]
    NoTasksRequested,
    #[error(transparent)]
    AssemblyAborted(#[from] AssemblyError),
}

impl PipelineError {
    /// True for problems with the uploaded document itself rather than
    /// with the system.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PipelineError::UnsupportedFormat(_)
                | PipelineError::EmptyContent(_)
                | PipelineError::NoTasksRequested
        )
    }
}

/// Extraction result plus the payload the analyses would receive.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub outcome: ExtractionOutcome,
    pub payload: NormalizedPayload,
}

pub struct Pipeline {
    extractor: TextExtractor,
    orchestrator: AnalysisOrchestrator,
    assembler: ReportAssembler,
    max_chars: usize,
    tasks: BTreeSet<AnalysisTask>,
}

impl Pipeline {
    pub fn new(
        extractor: TextExtractor,
        orchestrator: AnalysisOrchestrator,
        assembler: ReportAssembler,
        max_chars: usize,
        tasks: BTreeSet<AnalysisTask>,
    ) -> Self {
        Self {
            extractor,
            orchestrator,
            assembler,
            max_chars,
            tasks,
        }
    }

    /// Wire a pipeline from validated configuration and the two external
    /// engines.
    pub fn from_config(
        config: &Config,
        ocr: Arc<dyn OcrEngine>,
        backend: Arc<dyn CompletionBackend>,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(
            TextExtractor::new(ocr),
            AnalysisOrchestrator::new(backend, config.pipeline.deadline()),
            ReportAssembler::new(config.pipeline.initial_status()?),
            config.extraction.max_chars,
            config.pipeline.task_set()?,
        ))
    }

    pub fn tasks(&self) -> &BTreeSet<AnalysisTask> {
        &self.tasks
    }

    /// Classify, extract and normalize without running any analysis.
    pub async fn prepare(&self, doc: &SourceDocument) -> Result<PreparedDocument, PipelineError> {
        classify(doc.media_type())?;

        let outcome = self.extractor.extract(doc).await;
        match &outcome {
            ExtractionOutcome::Unsupported(media_type) => {
                return Err(UnsupportedFormat(media_type.clone()).into());
            }
            ExtractionOutcome::Failed(cause) => {
                return Err(PipelineError::ExtractionFailure(cause.clone()));
            }
            ExtractionOutcome::Text { .. } | ExtractionOutcome::TabularData(_) => {}
        }

        let payload = normalize(&outcome, self.max_chars).map_err(PipelineError::EmptyContent)?;
        Ok(PreparedDocument { outcome, payload })
    }

    /// Run every configured task.
    pub async fn run(&self, doc: SourceDocument) -> Result<ReportAggregate, PipelineError> {
        let tasks = self.tasks.clone();
        self.run_tasks(doc, &tasks).await
    }

    pub async fn run_tasks(
        &self,
        doc: SourceDocument,
        tasks: &BTreeSet<AnalysisTask>,
    ) -> Result<ReportAggregate, PipelineError> {
        if tasks.is_empty() {
            return Err(PipelineError::NoTasksRequested);
        }
        let PreparedDocument { outcome, payload } = self.prepare(&doc).await?;
        let Some(method) = outcome.method() else {
            return Err(PipelineError::ExtractionFailure(
                "extraction produced no content".to_string(),
            ));
        };

        tracing::info!(
            file = doc.filename(),
            %method,
            chars = payload.char_count(),
            truncated = payload.truncated(),
            "document prepared for analysis"
        );

        let outcomes = self.orchestrator.run(&payload, tasks).await;
        let mut report = self
            .assembler
            .assemble(doc.filename(), method, tasks, outcomes)?;

        report.media_type = doc.media_type().to_string();
        report.source_sha256 = doc.sha256();
        report.page_count = outcome.page_count();
        report.full_text = payload.into_string();

        tracing::info!(report = %report.id, status = %report.status, "report assembled");
        Ok(report)
    }
}
