// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run ledger trait.

use async_trait::async_trait;

use crate::error::ChroniclerError;
use crate::types::{RunRecord, RunStatus};

/// History of pipeline runs for operator visibility.
#[async_trait]
pub trait RunStore: Send + Sync + 'static {
    /// Records the start of a run.
    async fn start_run(&self, run: &RunRecord) -> Result<(), ChroniclerError>;

    /// Stamps a run with its final status and summary.
    async fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        summary: &serde_json::Value,
        error: Option<&str>,
    ) -> Result<(), ChroniclerError>;

    /// Most recent runs, newest first.
    async fn latest_runs(&self, limit: usize) -> Result<Vec<RunRecord>, ChroniclerError>;
}
