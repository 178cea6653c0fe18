// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task handlers run by the worker pool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chronicler_core::{GenerationRequest, RequestPurpose, Task, TaskPayload};
use chronicler_resilience::{CallError, RateLimitedCaller};

/// How a handler failed, which decides the task's next state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Worth another attempt; the task goes through `fail`.
    #[error("retryable: {0}")]
    Retryable(String),

    /// Retrying cannot help; the task is dead-lettered.
    #[error("permanent: {0}")]
    Permanent(String),

    /// The worker was told to stop. The lease is left to expire.
    #[error("cancelled")]
    Cancelled,
}

/// Executes one leased task.
///
/// Delivery is at-least-once, so implementations must tolerate running the
/// same task twice.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task, cancel: &CancellationToken) -> Result<(), TaskError>;
}

/// Sends every task to the generation service as its own request, shaped
/// by the task's kind.
pub struct GeneratingTaskHandler {
    caller: Arc<RateLimitedCaller>,
    model_id: String,
}

impl GeneratingTaskHandler {
    pub fn new(caller: Arc<RateLimitedCaller>, model_id: impl Into<String>) -> Self {
        Self {
            caller,
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl TaskHandler for GeneratingTaskHandler {
    async fn handle(&self, task: &Task, cancel: &CancellationToken) -> Result<(), TaskError> {
        let request = task_request(task, &self.model_id);
        debug!(task_id = %task.task_id, kind = %task.kind(), bytes = request.serialized_len(), "calling writer for task");
        match self.caller.call(&request, cancel).await {
            Ok(response) => {
                debug!(task_id = %task.task_id, kind = %task.kind(), result = %response.result_reference, "task generated");
                Ok(())
            }
            Err(CallError::Exhausted { attempts, last_error }) => Err(TaskError::Retryable(
                format!("{attempts} call attempts failed: {last_error}"),
            )),
            Err(CallError::Cancelled) => Err(TaskError::Cancelled),
            Err(err @ (CallError::Overflow { .. } | CallError::Rejected(_))) => {
                Err(TaskError::Permanent(err.to_string()))
            }
        }
    }
}

/// The downstream request for one task.
///
/// Every kind names its instruction and the subject it works on. The
/// idempotency key is the task id, so a redelivered task reuses it.
fn task_request(task: &Task, model_id: &str) -> GenerationRequest {
    let body = match &task.payload {
        TaskPayload::GenerateBanner {
            artifact_id,
            window_signature,
        } => json!({
            "instruction": "generate_banner",
            "artifact_id": artifact_id,
            "window_signature": window_signature,
        }),
        TaskPayload::UpdateProfile {
            author_id,
            window_signature,
        } => json!({
            "instruction": "update_profile",
            "author_id": author_id,
            "window_signature": window_signature,
        }),
        TaskPayload::EnrichUrl {
            url,
            window_signature,
        } => json!({
            "instruction": "enrich_url",
            "url": url,
            "window_signature": window_signature,
        }),
    };
    GenerationRequest {
        purpose: RequestPurpose::Task(task.kind()),
        model_id: model_id.to_string(),
        key: format!("task:{}", task.task_id),
        body,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use chronicler_core::{TaskKind, TaskStatus};

    use super::*;

    fn task(payload: TaskPayload) -> Task {
        Task {
            task_id: "t-1".into(),
            payload,
            status: TaskStatus::InProgress,
            attempts: 0,
            max_attempts: 3,
            lease_owner: Some("worker-0".into()),
            lease_expires_at: None,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn each_kind_gets_its_own_instruction() {
        let banner = task_request(
            &task(TaskPayload::GenerateBanner {
                artifact_id: "post-1".into(),
                window_signature: "sig".into(),
            }),
            "writer-1",
        );
        assert_eq!(banner.purpose, RequestPurpose::Task(TaskKind::GenerateBanner));
        assert_eq!(banner.body["instruction"], "generate_banner");
        assert_eq!(banner.body["artifact_id"], "post-1");

        let profile = task_request(
            &task(TaskPayload::UpdateProfile {
                author_id: "alice".into(),
                window_signature: "sig".into(),
            }),
            "writer-1",
        );
        assert_eq!(profile.body["instruction"], "update_profile");
        assert_eq!(profile.body["author_id"], "alice");
        assert!(profile.body.get("url").is_none());

        let url = task_request(
            &task(TaskPayload::EnrichUrl {
                url: "https://example.com/a".into(),
                window_signature: "sig".into(),
            }),
            "writer-1",
        );
        assert_eq!(url.purpose, RequestPurpose::Task(TaskKind::EnrichUrl));
        assert_eq!(url.body["instruction"], "enrich_url");
        assert_eq!(url.body["url"], "https://example.com/a");
        assert_eq!(url.body["window_signature"], "sig");
    }

    #[test]
    fn task_id_is_the_idempotency_key() {
        let request = task_request(
            &task(TaskPayload::UpdateProfile {
                author_id: "bob".into(),
                window_signature: "sig".into(),
            }),
            "writer-1",
        );
        assert_eq!(request.key, "task:t-1");
        assert_eq!(request.model_id, "writer-1");
    }
}
