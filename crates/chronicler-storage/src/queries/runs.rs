// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run ledger queries.

use chrono::{DateTime, Utc};
use rusqlite::params;

use chronicler_core::types::format_timestamp;
use chronicler_core::{ChroniclerError, RunRecord, RunStatus};

use super::{parse_opt_ts, parse_text, parse_ts};
use crate::database::{Database, map_tr_err};

pub async fn start_run(db: &Database, run: &RunRecord) -> Result<(), ChroniclerError> {
    let run_id = run.run_id.clone();
    let status = run.status.to_string();
    let started_at = format_timestamp(&run.started_at);
    let config_version = run.config_version.clone();
    let model_id = run.model_id.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO runs (run_id, status, started_at, config_version, model_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![run_id, status, started_at, config_version, model_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn finish_run(
    db: &Database,
    run_id: &str,
    status: RunStatus,
    summary: &serde_json::Value,
    error: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), ChroniclerError> {
    let run_id = run_id.to_string();
    let status = status.to_string();
    let summary = summary.to_string();
    let error = error.map(str::to_string);
    let finished_at = format_timestamp(&now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE runs SET status = ?2, finished_at = ?3, summary = ?4, error = ?5
                 WHERE run_id = ?1",
                params![run_id, status, finished_at, summary, error],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(ChroniclerError::storage("cannot finish unknown run"));
    }
    Ok(())
}

/// Newest runs first.
pub async fn latest_runs(db: &Database, limit: usize) -> Result<Vec<RunRecord>, ChroniclerError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<Vec<RunRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT run_id, status, started_at, finished_at, config_version, model_id,
                        summary, error
                 FROM runs ORDER BY started_at DESC, rowid DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                let status: String = row.get(1)?;
                let started_at: String = row.get(2)?;
                let summary: Option<String> = row.get(6)?;
                Ok(RunRecord {
                    run_id: row.get(0)?,
                    status: parse_text::<RunStatus>(1, &status)?,
                    started_at: parse_ts(2, &started_at)?,
                    finished_at: parse_opt_ts(3, row.get(3)?)?,
                    config_version: row.get(4)?,
                    model_id: row.get(5)?,
                    summary: summary.and_then(|s| serde_json::from_str(&s).ok()),
                    error: row.get(7)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
