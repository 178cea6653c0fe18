// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Window and task metrics, recorded through the `metrics` facade.

use metrics::describe_counter;

/// Registers descriptions for every Chronicler metric.
///
/// Call once after a recorder is installed; without one, recording is a no-op.
pub fn register_metrics() {
    describe_counter!(
        "chronicler_windows_total",
        "Windows by outcome: processed, skipped, split, failed, unsplittable"
    );
    describe_counter!(
        "chronicler_tasks_total",
        "Follow-up tasks by outcome: enqueued, enqueue_failed, completed, retried, dead"
    );
    chronicler_resilience::recording::describe();
}

pub(crate) fn record_window(outcome: &'static str) {
    metrics::counter!("chronicler_windows_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_task(outcome: &'static str) {
    metrics::counter!("chronicler_tasks_total", "outcome" => outcome).increment(1);
}
