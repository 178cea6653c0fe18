// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the journal, task queue, and run ledger traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use chronicler_config::model::{StorageConfig, TaskConfig};
use chronicler_core::{
    AdapterType, ChroniclerError, CommitOutcome, HealthStatus, JournalEntry, JournalStore,
    PluginAdapter, RunRecord, RunStatus, RunStore, Signature, Task, TaskCounts, TaskPayload,
    TaskStatus, TaskStore,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// Queue parameters fixed for the lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskQueueSettings {
    pub lease_timeout: Duration,
    /// Snapshotted onto each task at enqueue time.
    pub max_attempts: u32,
}

impl From<&TaskConfig> for TaskQueueSettings {
    fn from(config: &TaskConfig) -> Self {
        Self {
            lease_timeout: config.lease_timeout(),
            max_attempts: config.max_task_attempts,
        }
    }
}

/// SQLite-backed store.
///
/// The database is opened by [`SqliteStorage::initialize`]; every other
/// operation fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    queue: TaskQueueSettings,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig, queue: TaskQueueSettings) -> Self {
        Self {
            config,
            queue,
            db: OnceCell::new(),
        }
    }

    /// Opens the database and applies migrations.
    pub async fn initialize(&self) -> Result<(), ChroniclerError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| ChroniclerError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Checkpoints the WAL and closes the connection.
    pub async fn close(&self) -> Result<(), ChroniclerError> {
        self.db()?.clone().close().await
    }

    pub fn queue_settings(&self) -> TaskQueueSettings {
        self.queue
    }

    fn db(&self) -> Result<&Database, ChroniclerError> {
        self.db
            .get()
            .ok_or_else(|| ChroniclerError::storage("storage not initialized; call initialize() first"))
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ChroniclerError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".to_string()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl JournalStore for SqliteStorage {
    async fn lookup(&self, signature: &Signature) -> Result<Option<JournalEntry>, ChroniclerError> {
        queries::journal::lookup(self.db()?, signature).await
    }

    async fn commit(
        &self,
        signature: &Signature,
        result_reference: &str,
    ) -> Result<CommitOutcome, ChroniclerError> {
        queries::journal::commit(self.db()?, signature, result_reference, Utc::now()).await
    }

    async fn journal_count(&self) -> Result<u64, ChroniclerError> {
        queries::journal::count(self.db()?).await
    }
}

#[async_trait]
impl TaskStore for SqliteStorage {
    async fn enqueue(&self, payload: &TaskPayload) -> Result<String, ChroniclerError> {
        queries::tasks::enqueue(self.db()?, payload, self.queue.max_attempts, Utc::now()).await
    }

    async fn lease(&self, worker_id: &str, max_batch: usize) -> Result<Vec<Task>, ChroniclerError> {
        queries::tasks::lease(
            self.db()?,
            worker_id,
            max_batch,
            self.queue.lease_timeout,
            Utc::now(),
        )
        .await
    }

    async fn complete(&self, task_id: &str, worker_id: &str) -> Result<(), ChroniclerError> {
        queries::tasks::complete(self.db()?, task_id, worker_id, Utc::now()).await
    }

    async fn fail(
        &self,
        task_id: &str,
        worker_id: &str,
        reason: &str,
    ) -> Result<(), ChroniclerError> {
        let next =
            queries::tasks::fail(self.db()?, task_id, worker_id, reason, Utc::now()).await?;
        if next == TaskStatus::Dead {
            warn!(task_id, reason, "task exhausted its attempts");
        }
        Ok(())
    }

    async fn dead_letter(
        &self,
        task_id: &str,
        worker_id: &str,
        reason: &str,
    ) -> Result<(), ChroniclerError> {
        queries::tasks::dead_letter(self.db()?, task_id, worker_id, reason, Utc::now()).await
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, ChroniclerError> {
        queries::tasks::get_task(self.db()?, task_id).await
    }

    async fn task_counts(&self) -> Result<TaskCounts, ChroniclerError> {
        queries::tasks::counts(self.db()?).await
    }
}

#[async_trait]
impl RunStore for SqliteStorage {
    async fn start_run(&self, run: &RunRecord) -> Result<(), ChroniclerError> {
        queries::runs::start_run(self.db()?, run).await
    }

    async fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        summary: &serde_json::Value,
        error: Option<&str>,
    ) -> Result<(), ChroniclerError> {
        queries::runs::finish_run(self.db()?, run_id, status, summary, error, Utc::now()).await
    }

    async fn latest_runs(&self, limit: usize) -> Result<Vec<RunRecord>, ChroniclerError> {
        queries::runs::latest_runs(self.db()?, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn storage_at(path: &std::path::Path) -> SqliteStorage {
        SqliteStorage::new(
            StorageConfig {
                database_path: path.to_str().unwrap().to_string(),
                wal_mode: true,
            },
            TaskQueueSettings {
                lease_timeout: Duration::from_secs(60),
                max_attempts: 3,
            },
        )
    }

    #[tokio::test]
    async fn reports_adapter_identity() {
        let dir = tempdir().unwrap();
        let storage = storage_at(&dir.path().join("test.db"));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let storage = storage_at(&dir.path().join("test.db"));
        let sig = Signature::from_raw("a:b:c");
        assert!(storage.lookup(&sig).await.is_err());
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn initialize_twice_is_an_error() {
        let dir = tempdir().unwrap();
        let storage = storage_at(&dir.path().join("test.db"));
        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn journal_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let sig = Signature::from_raw("a:b:c");

        let first = storage_at(&path);
        first.initialize().await.unwrap();
        first.commit(&sig, "out/1").await.unwrap();
        first.close().await.unwrap();

        let second = storage_at(&path);
        second.initialize().await.unwrap();
        let entry = second.lookup(&sig).await.unwrap().unwrap();
        assert_eq!(entry.result_reference, "out/1");
        assert_eq!(second.journal_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn enqueue_snapshots_configured_max_attempts() {
        let dir = tempdir().unwrap();
        let storage = storage_at(&dir.path().join("test.db"));
        storage.initialize().await.unwrap();
        let id = storage
            .enqueue(&TaskPayload::EnrichUrl {
                url: "https://example.com".to_string(),
                window_signature: "s".to_string(),
            })
            .await
            .unwrap();
        let task = storage.get_task(&id).await.unwrap().unwrap();
        assert_eq!(task.max_attempts, 3);
        assert_eq!(task.status, TaskStatus::Pending);
    }
}
