// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate-limited access to the downstream generation service.
//!
//! A [`CredentialPool`] rotates across credentials that each carry their own
//! [`CredentialLimiter`]; [`RateLimitedCaller`] layers retries, backoff, and
//! cancellation on top.

pub mod backoff;
pub mod caller;
pub mod limiter;
pub mod pool;
pub mod recording;

pub use backoff::Backoff;
pub use caller::{CallError, CallerSettings, RateLimitedCaller};
pub use limiter::{CredentialLimiter, GovernorLimiter};
pub use pool::{AcquireError, CredentialPool};
