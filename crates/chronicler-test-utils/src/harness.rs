// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline tests.
//!
//! `TestHarness` wires a [`MockGenerator`] and [`FakeLimiter`]s to a
//! temporary SQLite store and hands out runners and orchestrators built the
//! same way the binary builds them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use chronicler_config::model::{
    CallerConfig, ChroniclerConfig, PipelineConfig, StorageConfig, TaskConfig,
};
use chronicler_core::{ChroniclerError, Credential, Message};
use chronicler_pipeline::{
    GeneratingTaskHandler, Orchestrator, PipelineRunner, PipelineSettings, WorkerSettings,
};
use chronicler_resilience::{
    Backoff, CallerSettings, CredentialLimiter, CredentialPool, RateLimitedCaller,
};
use chronicler_storage::{SqliteStorage, TaskQueueSettings};

use crate::fake_limiter::FakeLimiter;
use crate::mock_generator::MockGenerator;

const AUTHORS: [&str; 2] = ["alice", "bob"];

/// Messages one minute apart whose bodies have the given byte sizes.
/// Authors alternate between `alice` and `bob`.
pub fn messages_of_sizes(sizes: &[usize]) -> Vec<Message> {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single();
    let base = base.unwrap_or_else(Utc::now);
    sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| {
            let digit = char::from(b'a' + (i % 26) as u8);
            Message::new(
                base + chrono::Duration::minutes(i as i64),
                AUTHORS[i % AUTHORS.len()],
                digit.to_string().repeat(size),
            )
        })
        .collect()
}

/// Builder for creating test environments.
pub struct TestHarnessBuilder {
    generator: MockGenerator,
    config: ChroniclerConfig,
    credentials: usize,
    backoff: Backoff,
    temp_dir: Option<Arc<tempfile::TempDir>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let config = ChroniclerConfig {
            pipeline: PipelineConfig {
                shutdown_grace_secs: 0,
                ..PipelineConfig::default()
            },
            caller: CallerConfig {
                capacity_wait_secs: 5,
                ..CallerConfig::default()
            },
            tasks: TaskConfig {
                task_worker_count: 0,
                poll_interval_ms: 10,
                ..TaskConfig::default()
            },
            ..ChroniclerConfig::default()
        };
        Self {
            generator: MockGenerator::new(),
            config,
            credentials: 1,
            backoff: Backoff::fixed(Duration::from_millis(1), Duration::from_millis(10)),
            temp_dir: None,
        }
    }

    pub fn with_generator(mut self, generator: MockGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_pipeline(mut self, edit: impl FnOnce(&mut PipelineConfig)) -> Self {
        edit(&mut self.config.pipeline);
        self
    }

    pub fn with_caller(mut self, edit: impl FnOnce(&mut CallerConfig)) -> Self {
        edit(&mut self.config.caller);
        self
    }

    pub fn with_tasks(mut self, edit: impl FnOnce(&mut TaskConfig)) -> Self {
        edit(&mut self.config.tasks);
        self
    }

    /// Number of credentials, each with an unlimited [`FakeLimiter`].
    pub fn with_credentials(mut self, n: usize) -> Self {
        self.credentials = n;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn build(self) -> Result<TestHarness, ChroniclerError> {
        let temp_dir = match self.temp_dir {
            Some(dir) => dir,
            None => Arc::new(tempfile::TempDir::new().map_err(ChroniclerError::storage)?),
        };
        let db_path = temp_dir.path().join("chronicler.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };

        let storage = SqliteStorage::new(
            config.storage.clone(),
            TaskQueueSettings::from(&config.tasks),
        );
        storage.initialize().await?;

        let limiters: Vec<Arc<FakeLimiter>> = (0..self.credentials)
            .map(|_| Arc::new(FakeLimiter::unlimited()))
            .collect();
        let pool = CredentialPool::new(limiters.iter().enumerate().map(|(i, limiter)| {
            let limiter: Arc<dyn CredentialLimiter> = limiter.clone();
            (Credential::new(format!("cred-{i}"), format!("token-{i}")), limiter)
        }))?;

        let generator = Arc::new(self.generator);
        let settings = CallerSettings {
            backoff: self.backoff,
            ..CallerSettings::from(&config.caller)
        };
        let caller = Arc::new(RateLimitedCaller::new(generator.clone(), pool, settings));

        Ok(TestHarness {
            generator,
            storage: Arc::new(storage),
            caller,
            limiters,
            config,
            backoff: self.backoff,
            credentials: self.credentials,
            temp_dir,
        })
    }
}

/// A complete test environment backed by a temporary database.
pub struct TestHarness {
    pub generator: Arc<MockGenerator>,
    pub storage: Arc<SqliteStorage>,
    pub caller: Arc<RateLimitedCaller>,
    pub limiters: Vec<Arc<FakeLimiter>>,
    pub config: ChroniclerConfig,
    backoff: Backoff,
    credentials: usize,
    /// Kept alive so the database outlives every harness sharing it.
    temp_dir: Arc<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A window runner over this harness's storage and caller.
    pub fn runner(&self) -> PipelineRunner {
        PipelineRunner::new(
            self.storage.clone(),
            self.storage.clone(),
            self.caller.clone(),
            PipelineSettings::from(&self.config.pipeline),
        )
    }

    /// A full orchestrator with workers handling tasks through the mock.
    pub fn orchestrator(&self) -> Orchestrator {
        let handler = Arc::new(GeneratingTaskHandler::new(
            self.caller.clone(),
            self.config.pipeline.model_id.clone(),
        ));
        Orchestrator::new(
            self.runner(),
            self.storage.clone(),
            self.storage.clone(),
            handler,
            WorkerSettings::from(&self.config.tasks),
        )
    }

    /// A fresh process over the same database: new storage connection, new
    /// caller, and `generator` in place of the current mock.
    pub async fn restart(&self, generator: MockGenerator) -> Result<TestHarness, ChroniclerError> {
        TestHarnessBuilder {
            generator,
            config: self.config.clone(),
            credentials: self.credentials,
            backoff: self.backoff,
            temp_dir: Some(self.temp_dir.clone()),
        }
        .build()
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicler_core::JournalStore;

    #[test]
    fn messages_have_requested_sizes_and_order() {
        let messages = messages_of_sizes(&[3, 1, 2]);
        let sizes: Vec<usize> = messages.iter().map(|m| m.byte_size).collect();
        assert_eq!(sizes, vec![3, 1, 2]);
        assert!(messages.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(messages[1].author_id, "bob");
    }

    #[tokio::test]
    async fn harness_builds_with_empty_journal() {
        let harness = TestHarness::builder().with_credentials(2).build().await.unwrap();
        assert_eq!(harness.storage.journal_count().await.unwrap(), 0);
        assert_eq!(harness.limiters.len(), 2);
    }
}
