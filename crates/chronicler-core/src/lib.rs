// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Chronicler.
//!
//! Holds the data model shared by every stage (messages, windows, journal
//! entries, tasks), the signature engine, the error types, and the adapter
//! traits that storage and generation backends implement.

pub mod error;
pub mod signature;
pub mod traits;
pub mod types;

pub use error::{ChroniclerError, GenerationError};
pub use signature::Signature;
pub use types::{
    AdapterType, CommitOutcome, Credential, GenerationRequest, GenerationResponse, HealthStatus,
    JournalEntry, JournalStatus, Message, RequestPurpose, RunRecord, RunStatus, Task, TaskCounts,
    TaskKind, TaskPayload, TaskStatus, Window,
};

pub use traits::{GenerationService, JournalStore, PluginAdapter, RunStore, TaskStore};
