// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-credential rate limiters.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use governor::{Quota, RateLimiter};

use chronicler_core::ChroniclerError;

/// Capacity gate for one credential.
///
/// Implementations must be cheap to poll; [`CredentialPool`](crate::CredentialPool)
/// calls `try_acquire` on every slot before it decides to wait.
#[async_trait]
pub trait CredentialLimiter: Send + Sync {
    /// Takes one unit of capacity if available right now.
    fn try_acquire(&self) -> bool;

    /// Waits until one unit of capacity is available and takes it.
    ///
    /// Dropping the future before it resolves must not consume capacity.
    async fn acquire(&self);
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket allowing `requests_per_interval` calls per `interval`,
/// replenished evenly and bursting up to the full allowance.
pub struct GovernorLimiter {
    inner: DirectLimiter,
}

impl GovernorLimiter {
    pub fn new(requests_per_interval: u32, interval: Duration) -> Result<Self, ChroniclerError> {
        let burst = NonZeroU32::new(requests_per_interval).ok_or_else(|| {
            ChroniclerError::Config("requests_per_interval must be greater than zero".into())
        })?;
        let quota = Quota::with_period(interval / requests_per_interval)
            .ok_or_else(|| ChroniclerError::Config("rate limit interval must be non-zero".into()))?
            .allow_burst(burst);
        Ok(Self {
            inner: RateLimiter::direct(quota),
        })
    }
}

#[async_trait]
impl CredentialLimiter for GovernorLimiter {
    fn try_acquire(&self) -> bool {
        self.inner.check().is_ok()
    }

    async fn acquire(&self) {
        self.inner.until_ready().await;
    }
}
