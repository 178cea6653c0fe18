// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leased task queue.
//!
//! Lifecycle: `pending -> in_progress -> completed`, with `fail` sending a
//! task back to `pending` (or to `dead` once attempts are used up). A lease
//! that expires without `complete`/`fail` is reclaimed by the next `lease`
//! call and counts as one consumed attempt. Only the current lease owner may
//! move an in-progress task on.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};

use chronicler_core::types::format_timestamp;
use chronicler_core::{ChroniclerError, Task, TaskCounts, TaskPayload, TaskStatus};

use super::{parse_opt_ts, parse_text, parse_ts};
use crate::database::{Database, map_tr_err};

/// Reason recorded when an expired lease is reclaimed.
pub const LEASE_EXPIRED: &str = "lease expired";

const TASK_COLUMNS: &str = "task_id, payload, status, attempts, max_attempts, lease_owner,
     lease_expires_at, last_error, created_at, updated_at";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let payload: String = row.get(1)?;
    let status: String = row.get(2)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    Ok(Task {
        task_id: row.get(0)?,
        payload: serde_json::from_str(&payload).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        status: parse_text::<TaskStatus>(2, &status)?,
        attempts: row.get(3)?,
        max_attempts: row.get(4)?,
        lease_owner: row.get(5)?,
        lease_expires_at: parse_opt_ts(6, row.get(6)?)?,
        last_error: row.get(7)?,
        created_at: parse_ts(8, &created_at)?,
        updated_at: parse_ts(9, &updated_at)?,
    })
}

/// Persists a new pending task and returns its generated id.
pub async fn enqueue(
    db: &Database,
    payload: &TaskPayload,
    max_attempts: u32,
    now: DateTime<Utc>,
) -> Result<String, ChroniclerError> {
    let task_id = uuid::Uuid::new_v4().to_string();
    let kind = payload.kind().to_string();
    let payload = serde_json::to_string(payload).map_err(ChroniclerError::storage)?;
    let now = format_timestamp(&now);
    let id = task_id.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO tasks (task_id, kind, payload, status, attempts, max_attempts,
                                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?5, ?5)",
                params![id, kind, payload, max_attempts, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(task_id)
}

/// Claims up to `max_batch` tasks for `worker_id`.
///
/// Runs in one `BEGIN IMMEDIATE` transaction, so concurrent callers are
/// serialized and never receive the same task. Expired leases are reclaimed
/// first and each reclaim consumes an attempt. A task that had already used
/// all of its attempts before the lease ran out is moved to `dead` instead of
/// being handed out again.
/// Returns an empty list when nothing is eligible.
pub async fn lease(
    db: &Database,
    worker_id: &str,
    max_batch: usize,
    lease_timeout: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<Task>, ChroniclerError> {
    if max_batch == 0 {
        return Ok(Vec::new());
    }
    let worker_id = worker_id.to_string();
    let timeout = chrono::Duration::from_std(lease_timeout)
        .map_err(|e| ChroniclerError::Config(format!("invalid lease timeout: {e}")))?;
    let expires_at = format_timestamp(&(now + timeout));
    let now = format_timestamp(&now);
    let limit = i64::try_from(max_batch).unwrap_or(i64::MAX);

    db.connection()
        .call(move |conn| -> Result<Vec<Task>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            tx.execute(
                "UPDATE tasks SET status = 'dead', attempts = attempts + 1,
                     last_error = ?2, lease_owner = NULL, lease_expires_at = NULL,
                     updated_at = ?1
                 WHERE status = 'in_progress' AND lease_expires_at <= ?1
                   AND attempts >= max_attempts",
                params![now, LEASE_EXPIRED],
            )?;
            tx.execute(
                "UPDATE tasks SET status = 'pending', attempts = attempts + 1,
                     last_error = ?2, lease_owner = NULL, lease_expires_at = NULL,
                     updated_at = ?1
                 WHERE status = 'in_progress' AND lease_expires_at <= ?1",
                params![now, LEASE_EXPIRED],
            )?;

            let ids: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT task_id FROM tasks
                     WHERE status = 'pending'
                     ORDER BY created_at ASC, rowid ASC
                     LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };

            let mut leased = Vec::with_capacity(ids.len());
            for id in &ids {
                tx.execute(
                    "UPDATE tasks SET status = 'in_progress', lease_owner = ?2,
                         lease_expires_at = ?3, updated_at = ?4
                     WHERE task_id = ?1",
                    params![id, worker_id, expires_at, now],
                )?;
                let task = tx.query_row(
                    &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?1"),
                    params![id],
                    task_from_row,
                )?;
                leased.push(task);
            }

            tx.commit()?;
            Ok(leased)
        })
        .await
        .map_err(map_tr_err)
}

/// Marks an in-progress task completed and clears its lease.
///
/// Fails when `worker_id` no longer holds the lease.
pub async fn complete(
    db: &Database,
    task_id: &str,
    worker_id: &str,
    now: DateTime<Utc>,
) -> Result<(), ChroniclerError> {
    let id = task_id.to_string();
    let owner = worker_id.to_string();
    let now = format_timestamp(&now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE tasks SET status = 'completed', lease_owner = NULL,
                     lease_expires_at = NULL, updated_at = ?2
                 WHERE task_id = ?1 AND status = 'in_progress' AND lease_owner = ?3",
                params![id, now, owner],
            )
        })
        .await
        .map_err(map_tr_err)?;
    expect_transition(changed, task_id, "complete")
}

/// Records a failed attempt.
///
/// Attempts are incremented; the task goes back to `pending`, or to `dead`
/// once `attempts >= max_attempts`. Fails when `worker_id` no longer holds
/// the lease.
pub async fn fail(
    db: &Database,
    task_id: &str,
    worker_id: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<TaskStatus, ChroniclerError> {
    let id = task_id.to_string();
    let owner = worker_id.to_string();
    let reason = reason.to_string();
    let now = format_timestamp(&now);
    let outcome = db
        .connection()
        .call(move |conn| -> Result<Option<TaskStatus>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current: Option<(u32, u32)> = tx
                .query_row(
                    "SELECT attempts, max_attempts FROM tasks
                     WHERE task_id = ?1 AND status = 'in_progress' AND lease_owner = ?2",
                    params![id, owner],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((attempts, max_attempts)) = current else {
                return Ok(None);
            };

            let attempts = attempts + 1;
            let next = if attempts >= max_attempts {
                TaskStatus::Dead
            } else {
                TaskStatus::Pending
            };
            tx.execute(
                "UPDATE tasks SET status = ?2, attempts = ?3, last_error = ?4,
                     lease_owner = NULL, lease_expires_at = NULL, updated_at = ?5
                 WHERE task_id = ?1",
                params![id, next.to_string(), attempts, reason, now],
            )?;
            tx.commit()?;
            Ok(Some(next))
        })
        .await
        .map_err(map_tr_err)?;
    outcome.ok_or_else(|| not_in_progress(task_id, "fail"))
}

/// Moves an in-progress task straight to `dead`.
pub async fn dead_letter(
    db: &Database,
    task_id: &str,
    worker_id: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<(), ChroniclerError> {
    let id = task_id.to_string();
    let owner = worker_id.to_string();
    let reason = reason.to_string();
    let now = format_timestamp(&now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE tasks SET status = 'dead', attempts = attempts + 1,
                     last_error = ?2, lease_owner = NULL, lease_expires_at = NULL,
                     updated_at = ?3
                 WHERE task_id = ?1 AND status = 'in_progress' AND lease_owner = ?4",
                params![id, reason, now, owner],
            )
        })
        .await
        .map_err(map_tr_err)?;
    expect_transition(changed, task_id, "dead-letter")
}

pub async fn get_task(db: &Database, task_id: &str) -> Result<Option<Task>, ChroniclerError> {
    let id = task_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Task>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn counts(db: &Database) -> Result<TaskCounts, ChroniclerError> {
    db.connection()
        .call(|conn| -> Result<TaskCounts, rusqlite::Error> {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
            })?;
            let mut counts = TaskCounts::default();
            for row in rows {
                let (status, n) = row?;
                match parse_text::<TaskStatus>(0, &status)? {
                    TaskStatus::Pending => counts.pending = n,
                    TaskStatus::InProgress => counts.in_progress = n,
                    TaskStatus::Completed => counts.completed = n,
                    TaskStatus::Dead => counts.dead = n,
                }
            }
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}

fn expect_transition(changed: usize, task_id: &str, op: &str) -> Result<(), ChroniclerError> {
    if changed == 0 {
        return Err(not_in_progress(task_id, op));
    }
    Ok(())
}

fn not_in_progress(task_id: &str, op: &str) -> ChroniclerError {
    ChroniclerError::storage(format!(
        "cannot {op} task {task_id}: not found, not in progress, or leased by another worker"
    ))
}
