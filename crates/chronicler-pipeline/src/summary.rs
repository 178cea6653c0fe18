// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::Serialize;

use crate::worker::WorkerStats;

/// Counts reported at the end of every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Windows whose call succeeded and were journaled.
    pub processed: u64,
    /// Windows already in the journal.
    pub skipped: u64,
    /// Overflowing windows replaced by two halves.
    pub split: u64,
    /// Windows that failed for a non-overflow reason. Not journaled.
    pub failed: u64,
    /// Single-message windows that still overflowed.
    pub unsplittable: u64,
    pub tasks_enqueued: u64,
    pub enqueue_failures: u64,
    pub workers: WorkerStats,
    /// The run stopped early on a cancellation signal.
    pub cancelled: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} skipped={} split={} failed={} unsplittable={} \
             tasks_enqueued={} enqueue_failures={} tasks_completed={} tasks_retried={} \
             tasks_dead={}",
            self.processed,
            self.skipped,
            self.split,
            self.failed,
            self.unsplittable,
            self.tasks_enqueued,
            self.enqueue_failures,
            self.workers.completed,
            self.workers.retried,
            self.workers.dead_lettered,
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_count() {
        let summary = RunSummary {
            processed: 4,
            failed: 1,
            cancelled: true,
            ..RunSummary::default()
        };
        let text = summary.to_string();
        assert!(text.starts_with("processed=4 skipped=0"));
        assert!(text.contains("failed=1"));
        assert!(text.ends_with("(cancelled)"));
    }

    #[test]
    fn serializes_nested_worker_stats() {
        let value = serde_json::to_value(RunSummary::default()).unwrap();
        assert_eq!(value["workers"]["completed"], 0);
        assert_eq!(value["cancelled"], false);
    }
}
