// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chronicler status` command implementation.
//!
//! Opens the database read-write (migrations may need to run) and reports
//! journal size, task queue counts, and the most recent runs.

use serde::Serialize;

use chronicler_config::ChroniclerConfig;
use chronicler_core::types::format_timestamp;
use chronicler_core::{ChroniclerError, JournalStore, RunStore, TaskCounts, TaskStore};
use chronicler_storage::{SqliteStorage, TaskQueueSettings};

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub database_path: String,
    pub journal_entries: u64,
    pub tasks: TaskCounts,
    pub runs: Vec<RunLine>,
}

#[derive(Debug, Serialize)]
pub struct RunLine {
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub summary: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Run the `chronicler status` command.
pub async fn run_status(
    config: &ChroniclerConfig,
    json: bool,
    runs: usize,
) -> Result<(), ChroniclerError> {
    let storage = SqliteStorage::new(
        config.storage.clone(),
        TaskQueueSettings::from(&config.tasks),
    );
    storage.initialize().await?;
    let report = collect_status(&storage, &config.storage.database_path, runs).await;
    storage.close().await?;
    let report = report?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn collect_status(
    storage: &SqliteStorage,
    database_path: &str,
    runs: usize,
) -> Result<StatusReport, ChroniclerError> {
    let journal_entries = storage.journal_count().await?;
    let tasks = storage.task_counts().await?;
    let runs = storage
        .latest_runs(runs)
        .await?
        .into_iter()
        .map(|run| RunLine {
            run_id: run.run_id,
            status: run.status.to_string(),
            started_at: format_timestamp(&run.started_at),
            finished_at: run.finished_at.as_ref().map(format_timestamp),
            summary: run.summary,
            error: run.error,
        })
        .collect();
    Ok(StatusReport {
        database_path: database_path.to_string(),
        journal_entries,
        tasks,
        runs,
    })
}

fn print_report(report: &StatusReport) {
    println!("database:  {}", report.database_path);
    println!("journal:   {} windows done", report.journal_entries);
    println!(
        "tasks:     {} pending, {} in progress, {} completed, {} dead",
        report.tasks.pending, report.tasks.in_progress, report.tasks.completed, report.tasks.dead
    );
    if report.runs.is_empty() {
        println!("runs:      none recorded");
        return;
    }
    println!("runs:");
    for run in &report.runs {
        let finished = run.finished_at.as_deref().unwrap_or("-");
        println!(
            "  {}  {:<9}  {} -> {}",
            run.run_id, run.status, run.started_at, finished
        );
        if let Some(error) = &run.error {
            println!("      error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chronicler_config::model::{StorageConfig, TaskConfig};
    use chronicler_core::{RunRecord, RunStatus, Signature, TaskPayload};

    #[tokio::test]
    async fn status_reports_every_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.db").to_string_lossy().to_string();
        let storage = SqliteStorage::new(
            StorageConfig {
                database_path: path.clone(),
                wal_mode: true,
            },
            TaskQueueSettings::from(&TaskConfig::default()),
        );
        storage.initialize().await.unwrap();

        storage
            .commit(&Signature::from_raw("a:b:m"), "out/1")
            .await
            .unwrap();
        storage
            .enqueue(&TaskPayload::EnrichUrl {
                url: "https://example.com".into(),
                window_signature: "a:b:m".into(),
            })
            .await
            .unwrap();
        storage
            .start_run(&RunRecord {
                run_id: "run-1".into(),
                status: RunStatus::Running,
                started_at: Utc::now(),
                finished_at: None,
                config_version: "v1".into(),
                model_id: "m".into(),
                summary: None,
                error: None,
            })
            .await
            .unwrap();

        let report = collect_status(&storage, &path, 5).await.unwrap();
        assert_eq!(report.journal_entries, 1);
        assert_eq!(report.tasks.pending, 1);
        assert_eq!(report.runs.len(), 1);
        assert_eq!(report.runs[0].status, "running");
        assert!(report.runs[0].finished_at.is_none());
    }
}
