// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling and the shutdown grace period.
//!
//! SIGTERM and SIGINT (Ctrl+C) cancel the token the pipeline watches. A
//! second signal is not special: the grace period already bounds shutdown.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One grace period shared by everything that winds down on cancellation.
///
/// The clock starts when `cancel` fires. The abort token is cancelled once
/// the grace period has passed, and [`remaining`](Self::remaining) reports
/// what is left of it. Dropping the deadline disarms it.
pub struct GraceDeadline {
    cancel: CancellationToken,
    abort: CancellationToken,
    grace: Duration,
    started: Arc<OnceLock<Instant>>,
    timer: JoinHandle<()>,
}

impl GraceDeadline {
    pub fn arm(cancel: &CancellationToken, grace: Duration) -> Self {
        let abort = CancellationToken::new();
        let started = Arc::new(OnceLock::new());
        let timer = tokio::spawn({
            let cancel = cancel.clone();
            let abort = abort.clone();
            let started = started.clone();
            async move {
                cancel.cancelled().await;
                let start = *started.get_or_init(Instant::now);
                if !grace.is_zero() {
                    info!(?grace, "cancellation requested; waiting for in-flight work");
                    tokio::time::sleep_until(start + grace).await;
                }
                abort.cancel();
            }
        });
        Self {
            cancel: cancel.clone(),
            abort,
            grace,
            started,
            timer,
        }
    }

    /// Cancelled when the grace period runs out.
    pub fn abort_token(&self) -> &CancellationToken {
        &self.abort
    }

    /// Time left of the grace period; all of it before cancellation.
    pub fn remaining(&self) -> Duration {
        if !self.cancel.is_cancelled() {
            return self.grace;
        }
        let start = *self.started.get_or_init(Instant::now);
        self.grace.saturating_sub(start.elapsed())
    }
}

impl Drop for GraceDeadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

/// Installs handlers for SIGTERM and SIGINT.
///
/// Returns a token that is cancelled when either signal arrives. The handler
/// task also exits if the token is cancelled some other way.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let watched = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = watched.cancelled() => {
                debug!("shutdown token cancelled before any signal");
                return;
            }
            _ = wait_for_signal() => {}
        }
        watched.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                    _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "could not install SIGTERM handler; only Ctrl+C will stop the run"),
        }
    }

    match ctrl_c.await {
        Ok(()) => info!("received Ctrl+C, initiating shutdown"),
        Err(e) => {
            warn!(error = %e, "could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
