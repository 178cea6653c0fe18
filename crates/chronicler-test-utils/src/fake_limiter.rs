// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A limiter whose capacity only changes when a test says so.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use chronicler_resilience::CredentialLimiter;

/// Credential limiter with a fixed number of permits and no clock.
///
/// Permits are consumed by `try_acquire`/`acquire` and only come back
/// through [`FakeLimiter::refill`].
pub struct FakeLimiter {
    available: AtomicU64,
    acquired: AtomicU64,
    refilled: Notify,
}

impl FakeLimiter {
    pub fn new(permits: u64) -> Self {
        Self {
            available: AtomicU64::new(permits),
            acquired: AtomicU64::new(0),
            refilled: Notify::new(),
        }
    }

    /// A limiter that never runs out.
    pub fn unlimited() -> Self {
        Self::new(u64::MAX)
    }

    /// Adds `permits` and wakes every waiting `acquire`.
    pub fn refill(&self, permits: u64) {
        self.available.fetch_add(permits, Ordering::SeqCst);
        self.refilled.notify_waiters();
    }

    /// Permits handed out so far.
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> u64 {
        self.available.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialLimiter for FakeLimiter {
    fn try_acquire(&self) -> bool {
        let took = self
            .available
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }
        took
    }

    async fn acquire(&self) {
        loop {
            // Register before checking so a refill in between is not missed.
            let refilled = self.refilled.notified();
            if self.try_acquire() {
                return;
            }
            refilled.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn permits_run_out() {
        let limiter = FakeLimiter::new(2);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.acquired(), 2);
        assert_eq!(limiter.available(), 0);
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        let limiter = Arc::new(FakeLimiter::new(0));
        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        limiter.refill(1);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("acquire should finish after refill")
            .unwrap();
        assert_eq!(limiter.acquired(), 1);
        assert_eq!(limiter.available(), 0);
    }
}
