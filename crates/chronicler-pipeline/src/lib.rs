// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pipeline runner and task worker pool for Chronicler.
//!
//! [`PipelineRunner`] moves windows through the journal and the rate-limited
//! caller. Follow-up work it enqueues is drained by a [`WorkerPool`];
//! [`Orchestrator`] runs both and records the outcome in the run ledger.

pub mod followup;
pub mod handler;
pub mod orchestrator;
pub mod recording;
pub mod runner;
pub mod shutdown;
pub mod summary;
pub mod worker;

pub use followup::{FollowupPolicy, derive_tasks};
pub use handler::{GeneratingTaskHandler, TaskError, TaskHandler};
pub use orchestrator::Orchestrator;
pub use recording::register_metrics;
pub use runner::{PipelineRunner, PipelineSettings, RunFailure};
pub use shutdown::{GraceDeadline, install_signal_handler};
pub use summary::RunSummary;
pub use worker::{WorkerPool, WorkerSettings, WorkerStats};
