// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Chronicler configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChroniclerConfig {
    /// Windowing and run-loop settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Rate-limited caller and credential pool settings.
    #[serde(default)]
    pub caller: CallerConfig,

    /// Task queue and worker pool settings.
    #[serde(default)]
    pub tasks: TaskConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP writer service settings.
    #[serde(default)]
    pub writer: WriterConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Windowing and run-loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Byte budget each packed window must fit in.
    #[serde(default = "default_window_budget_bytes")]
    pub window_budget_bytes: usize,

    /// Windows allowed to have an external call in flight at once.
    #[serde(default = "default_max_in_flight_windows")]
    pub max_in_flight_windows: usize,

    /// Version of the prompt/configuration logic; part of every signature.
    #[serde(default = "default_config_version")]
    pub config_version: String,

    /// Target model identifier; part of every signature.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Stop after this many root windows. 0 processes everything.
    #[serde(default)]
    pub max_windows: usize,

    /// Attempts for a journal commit after the external call succeeded.
    #[serde(default = "default_journal_commit_attempts")]
    pub journal_commit_attempts: u32,

    /// Time in-flight window calls and task handlers get to finish after
    /// cancellation. One period covers both, counted from the signal.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Accept inputs containing a single message larger than the budget.
    #[serde(default)]
    pub allow_oversized_messages: bool,

    /// Enqueue a banner task per artifact the writer reports.
    #[serde(default = "default_true")]
    pub enable_banners: bool,

    /// Enqueue a profile update per distinct author in a window.
    #[serde(default = "default_true")]
    pub enable_profiles: bool,

    /// Enqueue an enrichment task per distinct URL in a window.
    #[serde(default = "default_true")]
    pub enable_url_enrichment: bool,
}

impl PipelineConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_budget_bytes: default_window_budget_bytes(),
            max_in_flight_windows: default_max_in_flight_windows(),
            config_version: default_config_version(),
            model_id: default_model_id(),
            max_windows: 0,
            journal_commit_attempts: default_journal_commit_attempts(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            allow_oversized_messages: false,
            enable_banners: true,
            enable_profiles: true,
            enable_url_enrichment: true,
        }
    }
}

fn default_window_budget_bytes() -> usize {
    320_000
}

fn default_max_in_flight_windows() -> usize {
    1
}

fn default_config_version() -> String {
    "v1".to_string()
}

fn default_model_id() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_journal_commit_attempts() -> u32 {
    3
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Rate-limited caller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CallerConfig {
    /// Total attempts per call when the service reports transient errors.
    #[serde(default = "default_max_call_attempts")]
    pub max_call_attempts: u32,

    /// First backoff delay; doubled on every further transient error.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Longest a call waits for credential capacity before counting a transient failure.
    #[serde(default = "default_capacity_wait_secs")]
    pub capacity_wait_secs: u64,

    /// Credentials to rotate across. Must not be empty.
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
}

impl CallerConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn capacity_wait(&self) -> Duration {
        Duration::from_secs(self.capacity_wait_secs)
    }
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            max_call_attempts: default_max_call_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            capacity_wait_secs: default_capacity_wait_secs(),
            credentials: Vec::new(),
        }
    }
}

fn default_max_call_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_capacity_wait_secs() -> u64 {
    60
}

/// One credential and its independent rate.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialConfig {
    /// Label used in logs.
    pub name: String,

    /// Opaque token handed to the generation service.
    pub token: String,

    /// Requests allowed per interval under this credential.
    #[serde(default = "default_requests_per_interval")]
    pub requests_per_interval: u32,

    /// Interval length in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl CredentialConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_requests_per_interval() -> u32 {
    10
}

fn default_interval_secs() -> u64 {
    60
}

/// Task queue and worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Concurrent workers draining the queue. 0 disables the pool.
    #[serde(default = "default_task_worker_count")]
    pub task_worker_count: usize,

    /// Lease length; an unfinished lease older than this is reclaimable.
    #[serde(default = "default_task_lease_timeout_secs")]
    pub task_lease_timeout_secs: u64,

    /// Attempts before a task is dead-lettered.
    #[serde(default = "default_max_task_attempts")]
    pub max_task_attempts: u32,

    /// Tasks claimed per lease call.
    #[serde(default = "default_lease_batch_size")]
    pub lease_batch_size: usize,

    /// Idle delay between empty lease calls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl TaskConfig {
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.task_lease_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            task_worker_count: default_task_worker_count(),
            task_lease_timeout_secs: default_task_lease_timeout_secs(),
            max_task_attempts: default_max_task_attempts(),
            lease_batch_size: default_lease_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_task_worker_count() -> usize {
    2
}

fn default_task_lease_timeout_secs() -> u64 {
    300
}

fn default_max_task_attempts() -> u32 {
    3
}

fn default_lease_batch_size() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chronicler").join("chronicler.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("chronicler.db"))
        .to_string_lossy()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP writer service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WriterConfig {
    /// Endpoint that accepts generation requests.
    #[serde(default = "default_writer_endpoint")]
    pub endpoint: String,

    /// Per-request timeout.
    #[serde(default = "default_writer_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest request body the service accepts, if advertised.
    #[serde(default)]
    pub max_request_bytes: Option<usize>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            endpoint: default_writer_endpoint(),
            timeout_secs: default_writer_timeout_secs(),
            max_request_bytes: None,
        }
    }
}

fn default_writer_endpoint() -> String {
    "http://127.0.0.1:8787/v1/generate".to_string()
}

fn default_writer_timeout_secs() -> u64 {
    300
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
