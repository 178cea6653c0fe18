// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call metrics, recorded through the `metrics` facade.

use metrics::{describe_counter, describe_histogram};

pub fn describe() {
    describe_counter!(
        "chronicler_calls_total",
        "Downstream generation call attempts by outcome"
    );
    describe_histogram!(
        "chronicler_call_latency_seconds",
        "Downstream generation call latency in seconds"
    );
}

pub(crate) fn record_call(outcome: &'static str) {
    metrics::counter!("chronicler_calls_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_latency(seconds: f64) {
    metrics::histogram!("chronicler_call_latency_seconds").record(seconds);
}
