// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Chronicler orchestration core.

use thiserror::Error;

/// The primary error type used across Chronicler adapter traits and core operations.
#[derive(Debug, Error)]
pub enum ChroniclerError {
    /// Configuration errors (invalid values, missing credentials, impossible budgets).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generation service errors that escape the per-window isolation boundary.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The run was cancelled before it could finish.
    #[error("run cancelled")]
    Cancelled,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChroniclerError {
    /// Wraps any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }
}

/// Outcome of a single downstream generation call.
///
/// This is the contract every [`GenerationService`](crate::GenerationService)
/// reports through. `Overflow` is never retried with the same input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The request exceeds the service's size limit.
    #[error("request of {request_bytes} bytes exceeds the service limit")]
    Overflow {
        request_bytes: usize,
        limit: Option<usize>,
    },

    /// Network failure, 5xx, or an explicit rate-limit response.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The service refused the request for a reason retrying cannot fix.
    #[error("request rejected: {0}")]
    Rejected(String),
}
