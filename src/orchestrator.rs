//! Concurrent dispatch of analysis tasks over one normalized payload.
//!
//! Every requested task becomes an independent tokio task holding only an
//! `Arc` of the payload text and the backend. [`AnalysisOrchestrator::run`]
//! waits for all of them (no short-circuit on the first failure) and always
//! returns one [`AnalysisOutcome`] per requested task. Tasks still running
//! when the overall deadline expires are aborted and reported as
//! [`TaskFailure::Timeout`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::inference::{ChatMessage, CompletionBackend, CompletionRequest, TransportError};
use crate::models::{AnalysisTask, AnalysisValue, NormalizedPayload};
use crate::prompts;
use crate::sanitize::{self, ParseError};

/// Why a task produced no structured result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskFailure {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("malformed response: {0}")]
    Malformed(#[from] ParseError),
    #[error("timed out before the analysis deadline")]
    Timeout,
    #[error("task aborted before producing a result")]
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success(AnalysisValue),
    Failure(TaskFailure),
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success(_))
    }
}

pub struct AnalysisOrchestrator {
    backend: Arc<dyn CompletionBackend>,
    deadline: Option<Duration>,
}

impl AnalysisOrchestrator {
    /// `deadline` bounds the whole run; `None` waits indefinitely.
    pub fn new(backend: Arc<dyn CompletionBackend>, deadline: Option<Duration>) -> Self {
        Self { backend, deadline }
    }

    pub async fn run(
        &self,
        payload: &NormalizedPayload,
        tasks: &BTreeSet<AnalysisTask>,
    ) -> BTreeMap<AnalysisTask, AnalysisOutcome> {
        let content: Arc<str> = Arc::from(payload.as_str());
        let mut set = JoinSet::new();
        let mut spawned = HashMap::with_capacity(tasks.len());

        for &task in tasks {
            let backend = Arc::clone(&self.backend);
            let content = Arc::clone(&content);
            let handle = set.spawn(async move {
                let started = Instant::now();
                let outcome = run_task(backend.as_ref(), task, &content).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                match &outcome {
                    AnalysisOutcome::Success(_) => {
                        tracing::debug!(%task, elapsed_ms, "analysis task finished");
                    }
                    AnalysisOutcome::Failure(failure) => {
                        tracing::warn!(%task, elapsed_ms, %failure, "analysis task failed");
                    }
                }
                (task, outcome)
            });
            spawned.insert(handle.id(), task);
        }
        tracing::info!(tasks = tasks.len(), chars = payload.char_count(), "dispatched analysis tasks");

        let deadline = self.deadline.map(|d| Instant::now() + d);
        let mut pending = tasks.clone();
        let mut results = BTreeMap::new();
        let mut timed_out = false;

        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, set.join_next_with_id()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(outstanding = pending.len(), "analysis deadline expired");
                        set.abort_all();
                        timed_out = true;
                        break;
                    }
                },
                None => set.join_next_with_id().await,
            };
            match next {
                Some(Ok((_, (task, outcome)))) => {
                    pending.remove(&task);
                    results.insert(task, outcome);
                }
                Some(Err(join_err)) => {
                    match spawned.get(&join_err.id()) {
                        Some(&task) => {
                            tracing::warn!(%task, error = %join_err, "analysis task crashed");
                            pending.remove(&task);
                            results.insert(task, AnalysisOutcome::Failure(TaskFailure::Aborted));
                        }
                        None => tracing::warn!(error = %join_err, "analysis task crashed"),
                    }
                }
                None => break,
            }
        }

        let leftover = if timed_out {
            TaskFailure::Timeout
        } else {
            TaskFailure::Aborted
        };
        for task in pending {
            results.insert(task, AnalysisOutcome::Failure(leftover.clone()));
        }
        results
    }
}

/// One inference call plus sanitization.
async fn run_task(
    backend: &dyn CompletionBackend,
    task: AnalysisTask,
    content: &str,
) -> AnalysisOutcome {
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(prompts::SYSTEM_PROMPT),
            ChatMessage::user(prompts::render(task, content)),
        ],
        json_mode: true,
    };
    let raw = match backend.complete(request).await {
        Ok(raw) => raw,
        Err(e) => return AnalysisOutcome::Failure(e.into()),
    };
    match sanitize::parse(&raw, task) {
        Ok(value) => AnalysisOutcome::Success(value),
        Err(e) => AnalysisOutcome::Failure(e.into()),
    }
}
