// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential rotation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chronicler_config::model::CredentialConfig;
use chronicler_core::{ChroniclerError, Credential};

use crate::limiter::{CredentialLimiter, GovernorLimiter};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("no credential had capacity within {0:?}")]
    TimedOut(Duration),

    #[error("cancelled while waiting for credential capacity")]
    Cancelled,
}

struct Slot {
    credential: Credential,
    limiter: Arc<dyn CredentialLimiter>,
    /// Sequence number of the most recent use; 0 means never used.
    last_used: AtomicU64,
}

/// A fixed set of credentials, each behind its own limiter.
///
/// Selection prefers the least recently used credential that has capacity.
/// There is no pool-wide lock: each slot's limiter guards its own rate and
/// recency is tracked with atomics.
pub struct CredentialPool {
    slots: Vec<Slot>,
    sequence: AtomicU64,
}

impl CredentialPool {
    /// Builds a pool from explicit credential/limiter pairs.
    pub fn new(
        entries: impl IntoIterator<Item = (Credential, Arc<dyn CredentialLimiter>)>,
    ) -> Result<Self, ChroniclerError> {
        let slots: Vec<Slot> = entries
            .into_iter()
            .map(|(credential, limiter)| Slot {
                credential,
                limiter,
                last_used: AtomicU64::new(0),
            })
            .collect();
        if slots.is_empty() {
            return Err(ChroniclerError::Config(
                "credential pool must contain at least one credential".into(),
            ));
        }
        Ok(Self {
            slots,
            sequence: AtomicU64::new(0),
        })
    }

    /// Builds a pool with a [`GovernorLimiter`] per configured credential.
    pub fn from_config(credentials: &[CredentialConfig]) -> Result<Self, ChroniclerError> {
        let entries = credentials
            .iter()
            .map(|c| {
                let limiter: Arc<dyn CredentialLimiter> = Arc::new(GovernorLimiter::new(
                    c.requests_per_interval,
                    c.interval(),
                )?);
                Ok((Credential::new(&c.name, &c.token), limiter))
            })
            .collect::<Result<Vec<_>, ChroniclerError>>()?;
        Self::new(entries)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Takes capacity under one credential and returns it.
    ///
    /// Tries every credential in least-recently-used order first. If none has
    /// capacity, waits for whichever frees up first, for at most `max_wait`.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
        max_wait: Duration,
    ) -> Result<&Credential, AcquireError> {
        if cancel.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }

        for index in self.lru_order() {
            if self.slots[index].limiter.try_acquire() {
                return Ok(self.mark_used(index));
            }
        }

        debug!(credentials = self.slots.len(), "all credentials at capacity; waiting");
        let waits = self.slots.iter().map(|slot| slot.limiter.acquire());

        tokio::select! {
            _ = cancel.cancelled() => Err(AcquireError::Cancelled),
            _ = tokio::time::sleep(max_wait) => Err(AcquireError::TimedOut(max_wait)),
            (_, index, _) = futures::future::select_all(waits) => Ok(self.mark_used(index)),
        }
    }

    fn lru_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.slots.len()).collect();
        order.sort_by_key(|&i| self.slots[i].last_used.load(Ordering::Relaxed));
        order
    }

    fn mark_used(&self, index: usize) -> &Credential {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let slot = &self.slots[index];
        slot.last_used.store(seq, Ordering::Relaxed);
        debug!(credential = %slot.credential.name, "credential selected");
        &slot.credential
    }
}
