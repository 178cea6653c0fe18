// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for Chronicler.
//!
//! One WAL-mode database holds the journal of completed signatures, the
//! leased task queue, and the run ledger. All access goes through a single
//! `tokio-rusqlite` connection; schema changes are embedded `refinery`
//! migrations.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::{SqliteStorage, TaskQueueSettings};
pub use database::Database;
