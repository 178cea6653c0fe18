// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable task queue trait.

use async_trait::async_trait;

use crate::error::ChroniclerError;
use crate::types::{Task, TaskCounts, TaskPayload};

/// Durable queue of deferred work with leased, at-least-once delivery.
///
/// Lease timeout and attempt limits are properties of the store instance.
/// Tasks are never deleted; only their status changes.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Persists a new pending task and returns its id.
    async fn enqueue(&self, payload: &TaskPayload) -> Result<String, ChroniclerError>;

    /// Atomically claims up to `max_batch` eligible tasks for `worker_id`.
    ///
    /// Eligible means `pending`, or `in_progress` with an expired lease.
    /// Returns an empty list rather than waiting when nothing is available.
    async fn lease(&self, worker_id: &str, max_batch: usize) -> Result<Vec<Task>, ChroniclerError>;

    /// Marks a task leased by `worker_id` as completed.
    ///
    /// This and the two transitions below fail when `worker_id` no longer
    /// holds the lease.
    async fn complete(&self, task_id: &str, worker_id: &str) -> Result<(), ChroniclerError>;

    /// Records a failed attempt; the task returns to `pending` or becomes `dead`.
    async fn fail(
        &self,
        task_id: &str,
        worker_id: &str,
        reason: &str,
    ) -> Result<(), ChroniclerError>;

    /// Moves a task straight to `dead` for failures retrying cannot fix.
    async fn dead_letter(
        &self,
        task_id: &str,
        worker_id: &str,
        reason: &str,
    ) -> Result<(), ChroniclerError>;

    /// Fetches a task by id.
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, ChroniclerError>;

    /// Counts tasks per status.
    async fn task_counts(&self) -> Result<TaskCounts, ChroniclerError>;
}
