// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One complete run: ledger entry, worker pool, window loop, drain.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use chronicler_core::{ChroniclerError, Message, RunRecord, RunStatus, RunStore, TaskStore};

use crate::handler::TaskHandler;
use crate::runner::PipelineRunner;
use crate::shutdown::GraceDeadline;
use crate::summary::RunSummary;
use crate::worker::{WorkerPool, WorkerSettings};

/// Ties the window loop to the task workers and the run ledger.
pub struct Orchestrator {
    runner: PipelineRunner,
    tasks: Arc<dyn TaskStore>,
    runs: Arc<dyn RunStore>,
    handler: Arc<dyn TaskHandler>,
    workers: WorkerSettings,
}

impl Orchestrator {
    pub fn new(
        runner: PipelineRunner,
        tasks: Arc<dyn TaskStore>,
        runs: Arc<dyn RunStore>,
        handler: Arc<dyn TaskHandler>,
        workers: WorkerSettings,
    ) -> Self {
        Self {
            runner,
            tasks,
            runs,
            handler,
            workers,
        }
    }

    /// Processes `messages` and drains the follow-up tasks they produce.
    ///
    /// Workers start before the first window so follow-ups (and tasks left
    /// over from earlier runs) are handled while windows are still in flight.
    /// After the last window the pool keeps running until the queue is idle
    /// or `cancel` fires. The window loop and the pool share one shutdown
    /// grace period that starts when `cancel` fires.
    ///
    /// A run that fails still records the counts it reached in the ledger.
    pub async fn execute(
        &self,
        messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ChroniclerError> {
        self.runner.check_input(&messages)?;

        let settings = self.runner.settings();
        let run_id = uuid::Uuid::new_v4().to_string();
        self.runs
            .start_run(&RunRecord {
                run_id: run_id.clone(),
                status: RunStatus::Running,
                started_at: Utc::now(),
                finished_at: None,
                config_version: settings.config_version.clone(),
                model_id: settings.model_id.clone(),
                summary: None,
                error: None,
            })
            .await?;
        info!(%run_id, messages = messages.len(), "run started");

        let deadline = GraceDeadline::arm(cancel, settings.shutdown_grace);
        let pool = WorkerPool::spawn(self.tasks.clone(), self.handler.clone(), self.workers);
        let result = self.runner.run_within(messages, cancel, &deadline).await;
        if result.is_ok() {
            pool.wait_idle(self.tasks.as_ref(), cancel).await;
        }
        let workers = pool.shutdown(deadline.remaining()).await;

        match result {
            Ok(mut summary) => {
                summary.workers = workers;
                summary.cancelled |= cancel.is_cancelled();
                let status = if summary.cancelled {
                    RunStatus::Cancelled
                } else {
                    RunStatus::Completed
                };
                self.finish(&run_id, status, &summary, None).await;
                info!(%run_id, %status, %summary, "run finished");
                Ok(summary)
            }
            Err(failure) => {
                let mut summary = failure.summary;
                summary.workers = workers;
                summary.cancelled |= cancel.is_cancelled();
                let message = failure.error.to_string();
                self.finish(&run_id, RunStatus::Failed, &summary, Some(&message))
                    .await;
                error!(%run_id, error = %failure.error, %summary, "run failed");
                Err(failure.error)
            }
        }
    }

    async fn finish(
        &self,
        run_id: &str,
        status: RunStatus,
        summary: &RunSummary,
        error: Option<&str>,
    ) {
        let value = serde_json::to_value(summary).unwrap_or(serde_json::Value::Null);
        if let Err(e) = self.runs.finish_run(run_id, status, &value, error).await {
            warn!(%run_id, error = %e, "could not record run outcome");
        }
    }
}
