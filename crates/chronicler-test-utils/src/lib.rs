// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Chronicler integration tests.
//!
//! Deterministic stand-ins for the downstream service and the rate limiters,
//! plus a harness that wires them to a temporary SQLite store.
//!
//! # Components
//!
//! - [`MockGenerator`] - scripted generation service with a call log
//! - [`FakeLimiter`] - credential limiter with manually controlled capacity
//! - [`TestHarness`] - temp database, storage, caller, and pipeline wiring

pub mod fake_limiter;
pub mod harness;
pub mod mock_generator;

pub use fake_limiter::FakeLimiter;
pub use harness::{TestHarness, TestHarnessBuilder, messages_of_sizes};
pub use mock_generator::{MockGenerator, RecordedCall};
