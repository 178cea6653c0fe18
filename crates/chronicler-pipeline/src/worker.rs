// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker pool draining the task queue.
//!
//! Each worker loops `lease -> handle -> complete | fail | dead_letter`.
//! Stopping the pool ends leasing; batches already leased are finished
//! unless the grace period runs out first.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chronicler_config::model::TaskConfig;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chronicler_core::{Task, TaskStore};

use crate::handler::{TaskError, TaskHandler};
use crate::recording;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub worker_count: usize,
    pub batch_size: usize,
    pub poll_interval: Duration,
}

impl From<&TaskConfig> for WorkerSettings {
    fn from(config: &TaskConfig) -> Self {
        Self {
            worker_count: config.task_worker_count,
            batch_size: config.lease_batch_size,
            poll_interval: config.poll_interval(),
        }
    }
}

/// What the pool did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub completed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            completed: self.completed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

pub struct WorkerPool {
    workers: JoinSet<()>,
    stop: CancellationToken,
    abort: CancellationToken,
    counters: Arc<Counters>,
    poll_interval: Duration,
}

impl WorkerPool {
    /// Starts `settings.worker_count` workers. A count of zero starts none.
    pub fn spawn(
        store: Arc<dyn TaskStore>,
        handler: Arc<dyn TaskHandler>,
        settings: WorkerSettings,
    ) -> Self {
        let stop = CancellationToken::new();
        let abort = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let mut workers = JoinSet::new();

        for n in 0..settings.worker_count {
            let worker = Worker {
                id: format!("worker-{n}-{}", uuid::Uuid::new_v4().simple()),
                store: store.clone(),
                handler: handler.clone(),
                settings,
                stop: stop.clone(),
                abort: abort.clone(),
                counters: counters.clone(),
            };
            workers.spawn(worker.run());
        }
        if settings.worker_count > 0 {
            info!(workers = settings.worker_count, "task worker pool started");
        }

        Self {
            workers,
            stop,
            abort,
            counters,
            poll_interval: settings.poll_interval,
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    /// Waits until no task is pending or in progress, or `cancel` fires.
    pub async fn wait_idle(&self, store: &dyn TaskStore, cancel: &CancellationToken) {
        if self.workers.is_empty() {
            return;
        }
        loop {
            match store.task_counts().await {
                Ok(counts) if counts.pending == 0 && counts.in_progress == 0 => return,
                Ok(_) => {}
                Err(e) => warn!(error = %e, "could not read task counts while draining"),
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Stops leasing and waits for workers to finish their current batch.
    ///
    /// After `grace`, handlers still running are cancelled; their leases are
    /// left to expire and be reclaimed.
    pub async fn shutdown(mut self, grace: Duration) -> WorkerStats {
        self.stop.cancel();
        let drained = tokio::time::timeout(grace, async {
            while self.workers.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(?grace, "workers still busy after grace period; cancelling handlers");
            self.abort.cancel();
            while self.workers.join_next().await.is_some() {}
        }
        let stats = self.counters.snapshot();
        debug!(?stats, "task worker pool stopped");
        stats
    }
}

struct Worker {
    id: String,
    store: Arc<dyn TaskStore>,
    handler: Arc<dyn TaskHandler>,
    settings: WorkerSettings,
    stop: CancellationToken,
    abort: CancellationToken,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(self) {
        debug!(worker = %self.id, "worker started");
        while !self.stop.is_cancelled() {
            let batch = match self.store.lease(&self.id, self.settings.batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(worker = %self.id, error = %e, "lease failed");
                    Vec::new()
                }
            };

            if batch.is_empty() {
                tokio::select! {
                    _ = self.stop.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.poll_interval) => continue,
                }
            }

            debug!(worker = %self.id, leased = batch.len(), "leased task batch");
            for task in batch {
                self.process(task).await;
            }
        }
        debug!(worker = %self.id, "worker stopped");
    }

    async fn process(&self, task: Task) {
        let task_id = task.task_id.as_str();
        let kind = task.kind();
        let outcome = self.handler.handle(&task, &self.abort).await;

        let transition = match &outcome {
            Ok(()) => self.store.complete(task_id, &self.id).await,
            Err(TaskError::Retryable(reason)) => self.store.fail(task_id, &self.id, reason).await,
            Err(TaskError::Permanent(reason)) => {
                self.store.dead_letter(task_id, &self.id, reason).await
            }
            Err(TaskError::Cancelled) => {
                info!(task_id, %kind, "task interrupted by shutdown; lease left to expire");
                return;
            }
        };
        if let Err(e) = transition {
            error!(task_id, %kind, worker = %self.id, error = %e, "could not record task outcome");
            return;
        }

        match outcome {
            Ok(()) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                recording::record_task("completed");
                info!(task_id, %kind, "task completed");
            }
            Err(TaskError::Retryable(reason)) => {
                let attempt = task.attempts + 1;
                if attempt >= task.max_attempts {
                    self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
                    recording::record_task("dead");
                    error!(task_id, %kind, attempt, %reason, "task dead after exhausting attempts");
                } else {
                    self.counters.retried.fetch_add(1, Ordering::Relaxed);
                    recording::record_task("retried");
                    warn!(task_id, %kind, attempt, max_attempts = task.max_attempts, %reason, "task failed; will retry");
                }
            }
            Err(TaskError::Permanent(reason)) => {
                self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
                recording::record_task("dead");
                error!(task_id, %kind, %reason, "task dead-lettered");
            }
            Err(TaskError::Cancelled) => {}
        }
    }
}
