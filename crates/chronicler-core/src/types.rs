// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the windowing engine, storage, caller, and pipeline.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::signature::Signature;

/// Timestamp format used for every persisted instant.
///
/// Fixed width with millisecond precision so lexicographic order matches
/// chronological order inside SQLite.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Formats an instant with [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Generator,
}

// --- Input records ---

/// An immutable, already-parsed input message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: DateTime<Utc>,
    /// Opaque, stable author identifier.
    pub author_id: String,
    pub body: String,
    /// Size used for budget packing. Derived from the body length by [`Message::new`].
    pub byte_size: usize,
}

impl Message {
    /// Creates a message whose `byte_size` is the UTF-8 length of `body`.
    pub fn new(
        timestamp: DateTime<Utc>,
        author_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let body = body.into();
        Self {
            timestamp,
            author_id: author_id.into(),
            byte_size: body.len(),
            body,
        }
    }
}

/// A contiguous, ordered, non-empty run of messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    messages: Vec<Message>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    byte_total: usize,
}

impl Window {
    /// Builds a window over `messages`. Returns `None` for an empty list.
    ///
    /// Messages are kept in the order given; the time bounds are the minimum
    /// and maximum timestamps so an unsorted input still reports a sane span.
    pub fn new(messages: Vec<Message>) -> Option<Self> {
        let first = messages.first()?;
        let mut start_time = first.timestamp;
        let mut end_time = first.timestamp;
        let mut byte_total = 0usize;
        for message in &messages {
            start_time = start_time.min(message.timestamp);
            end_time = end_time.max(message.timestamp);
            byte_total = byte_total.saturating_add(message.byte_size);
        }
        Some(Self {
            messages,
            start_time,
            end_time,
            byte_total,
        })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; kept for API symmetry with [`Window::len`].
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn byte_total(&self) -> usize {
        self.byte_total
    }

    /// Human-readable span, e.g. `2026-01-01 10:00 to 12:30`.
    pub fn label(&self) -> String {
        format!(
            "{} to {}",
            self.start_time.format("%Y-%m-%d %H:%M"),
            self.end_time.format("%H:%M")
        )
    }

    /// Distinct author ids in first-appearance order.
    pub fn authors(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.messages
            .iter()
            .filter(|m| seen.insert(m.author_id.as_str()))
            .map(|m| m.author_id.as_str())
            .collect()
    }
}

// --- Journal ---

/// Status of a journal entry. Only completed work is journaled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum JournalStatus {
    Done,
}

/// A record that a signature has been processed successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub signature: Signature,
    pub status: JournalStatus,
    /// Opaque pointer to the persisted downstream output.
    pub result_reference: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a journal commit. Both variants are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// This call wrote the entry.
    Committed,
    /// An earlier commit already holds the signature; nothing changed.
    AlreadyCommitted,
}

// --- Tasks ---

/// Lifecycle state of a persisted task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Dead,
}

/// The closed set of deferred work kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    GenerateBanner,
    UpdateProfile,
    EnrichUrl,
}

/// Typed arguments for each [`TaskKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Render a banner for an artifact the writer produced.
    GenerateBanner {
        artifact_id: String,
        window_signature: String,
    },
    /// Refresh an author's profile from a window they appeared in.
    UpdateProfile {
        author_id: String,
        window_signature: String,
    },
    /// Fetch and summarize a URL shared in a window.
    EnrichUrl {
        url: String,
        window_signature: String,
    },
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::GenerateBanner { .. } => TaskKind::GenerateBanner,
            Self::UpdateProfile { .. } => TaskKind::UpdateProfile,
            Self::EnrichUrl { .. } => TaskKind::EnrichUrl,
        }
    }

    /// Signature of the window that produced this task.
    pub fn window_signature(&self) -> &str {
        match self {
            Self::GenerateBanner {
                window_signature, ..
            }
            | Self::UpdateProfile {
                window_signature, ..
            }
            | Self::EnrichUrl {
                window_signature, ..
            } => window_signature,
        }
    }
}

/// A persisted unit of deferred work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub task_id: String,
    pub payload: TaskPayload,
    pub status: TaskStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        self.payload.kind()
    }
}

/// Number of tasks in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub dead: u64,
}

// --- Runs ---

/// Final or current state of a pipeline run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// One row of the run ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_version: String,
    pub model_id: String,
    pub summary: Option<serde_json::Value>,
    pub error: Option<String>,
}

// --- Generation ---

/// What a generation request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum RequestPurpose {
    Window,
    Task(TaskKind),
}

/// A request to the downstream generation service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub purpose: RequestPurpose,
    pub model_id: String,
    /// Idempotency key: the window signature, or `task:<id>` for tasks.
    pub key: String,
    pub body: serde_json::Value,
}

impl GenerationRequest {
    /// Builds the request for a window's main generation call.
    pub fn for_window(window: &Window, signature: &Signature, model_id: &str) -> Self {
        let messages: Vec<serde_json::Value> = window
            .messages()
            .iter()
            .map(|m| {
                serde_json::json!({
                    "timestamp": format_timestamp(&m.timestamp),
                    "author_id": m.author_id,
                    "body": m.body,
                })
            })
            .collect();
        Self {
            purpose: RequestPurpose::Window,
            model_id: model_id.to_string(),
            key: signature.to_string(),
            body: serde_json::json!({
                "window_start": format_timestamp(&window.start_time()),
                "window_end": format_timestamp(&window.end_time()),
                "messages": messages,
            }),
        }
    }

    /// Length in bytes of the serialized request body.
    pub fn serialized_len(&self) -> usize {
        serde_json::to_vec(&self.body).map(|b| b.len()).unwrap_or(0)
    }
}

/// A successful downstream response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Opaque pointer to where the service persisted its output.
    pub result_reference: String,
    /// Identifiers of derivative artifacts that warrant follow-up work.
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// An opaque credential for the generation service.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Name used in logs; never the secret itself.
    pub name: String,
    pub token: SecretString,
}

impl Credential {
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: SecretString::from(token.into()),
        }
    }
}
