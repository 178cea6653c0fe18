// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The rate-limited caller.
//!
//! Every downstream request goes through [`RateLimitedCaller::call`], which
//! picks a credential, retries transient failures with exponential backoff,
//! and reports overflow without retrying.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chronicler_config::model::CallerConfig;
use chronicler_core::{GenerationError, GenerationRequest, GenerationResponse, GenerationService};

use crate::backoff::Backoff;
use crate::pool::{AcquireError, CredentialPool};
use crate::recording;

/// Terminal outcome of a [`RateLimitedCaller::call`] that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The request is too large. Never retried; callers split the input.
    #[error("request of {request_bytes} bytes overflows the service limit")]
    Overflow {
        request_bytes: usize,
        limit: Option<usize>,
    },

    /// The service refused the request for a non-transient reason.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Every attempt failed transiently.
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("call cancelled")]
    Cancelled,
}

/// Retry and capacity parameters.
#[derive(Debug, Clone, Copy)]
pub struct CallerSettings {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Longest wait for credential capacity per attempt.
    pub capacity_wait: Duration,
}

impl From<&CallerConfig> for CallerSettings {
    fn from(config: &CallerConfig) -> Self {
        Self {
            max_attempts: config.max_call_attempts,
            backoff: Backoff::new(config.backoff_base(), config.backoff_max()),
            capacity_wait: config.capacity_wait(),
        }
    }
}

pub struct RateLimitedCaller {
    service: Arc<dyn GenerationService>,
    pool: CredentialPool,
    settings: CallerSettings,
}

impl RateLimitedCaller {
    pub fn new(
        service: Arc<dyn GenerationService>,
        pool: CredentialPool,
        settings: CallerSettings,
    ) -> Self {
        Self {
            service,
            pool,
            settings,
        }
    }

    pub fn service(&self) -> &Arc<dyn GenerationService> {
        &self.service
    }

    /// Sends `request`, retrying transient failures.
    ///
    /// A request whose serialized body exceeds the service's advertised
    /// limit is reported as [`CallError::Overflow`] without being sent.
    /// Cancellation interrupts capacity waits, backoff sleeps, and the
    /// in-flight request itself.
    pub async fn call(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResponse, CallError> {
        if let Some(limit) = self.service.max_request_bytes() {
            let request_bytes = request.serialized_len();
            if request_bytes > limit {
                recording::record_call("overflow");
                debug!(key = %request.key, request_bytes, limit, "request over service limit; not sent");
                return Err(CallError::Overflow {
                    request_bytes,
                    limit: Some(limit),
                });
            }
        }

        let max_attempts = self.settings.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.settings.backoff.delay(attempt - 1);
                warn!(key = %request.key, attempt, ?delay, error = %last_error, "retrying after transient error");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(CallError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let credential = match self.pool.acquire(cancel, self.settings.capacity_wait).await {
                Ok(credential) => credential,
                Err(AcquireError::Cancelled) => return Err(CallError::Cancelled),
                Err(err @ AcquireError::TimedOut(_)) => {
                    recording::record_call("capacity_timeout");
                    last_error = err.to_string();
                    continue;
                }
            };

            let started = Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(CallError::Cancelled),
                outcome = self.service.generate(request, credential) => outcome,
            };
            recording::record_latency(started.elapsed().as_secs_f64());

            match outcome {
                Ok(response) => {
                    recording::record_call("success");
                    debug!(key = %request.key, attempt, credential = %credential.name, "call succeeded");
                    return Ok(response);
                }
                Err(GenerationError::Overflow {
                    request_bytes,
                    limit,
                }) => {
                    recording::record_call("overflow");
                    return Err(CallError::Overflow {
                        request_bytes,
                        limit,
                    });
                }
                Err(GenerationError::Rejected(reason)) => {
                    recording::record_call("rejected");
                    return Err(CallError::Rejected(reason));
                }
                Err(GenerationError::Transient(reason)) => {
                    recording::record_call("transient");
                    last_error = reason;
                }
            }
        }

        Err(CallError::Exhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}
