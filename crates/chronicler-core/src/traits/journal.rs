// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Journal store trait.

use async_trait::async_trait;

use crate::error::ChroniclerError;
use crate::signature::Signature;
use crate::types::{CommitOutcome, JournalEntry};

/// Append-only record of completed signatures.
#[async_trait]
pub trait JournalStore: Send + Sync + 'static {
    /// Returns the entry for `signature`, if one was committed.
    async fn lookup(&self, signature: &Signature) -> Result<Option<JournalEntry>, ChroniclerError>;

    /// Atomically records `signature` as done.
    ///
    /// Committing a signature that already exists is a successful no-op and
    /// never alters the stored entry.
    async fn commit(
        &self,
        signature: &Signature,
        result_reference: &str,
    ) -> Result<CommitOutcome, ChroniclerError>;

    /// Number of journaled signatures.
    async fn journal_count(&self) -> Result<u64, ChroniclerError>;
}
