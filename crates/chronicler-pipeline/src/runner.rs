// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The window loop.
//!
//! Windows are pulled from one work queue seeded by [`pack`]. Each window is
//! looked up in the journal, sent through the rate-limited caller, and then
//! either journaled, split (both halves go back to the front of the queue),
//! or counted as failed. A failed window is never journaled, so the next run
//! retries it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chronicler_config::model::PipelineConfig;
use chronicler_core::types::format_timestamp;
use chronicler_core::{
    ChroniclerError, CommitOutcome, GenerationRequest, GenerationResponse, JournalStore, Message,
    Signature, TaskStore, Window,
};
use chronicler_resilience::{CallError, RateLimitedCaller};
use chronicler_window::{largest_message, pack, split};

use crate::followup::{FollowupPolicy, derive_tasks};
use crate::recording;
use crate::shutdown::GraceDeadline;
use crate::summary::RunSummary;

const COMMIT_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub window_budget_bytes: usize,
    pub max_in_flight_windows: usize,
    pub config_version: String,
    pub model_id: String,
    /// Root windows to consider; 0 means all.
    pub max_windows: usize,
    pub journal_commit_attempts: u32,
    pub shutdown_grace: Duration,
    pub allow_oversized_messages: bool,
    pub followups: FollowupPolicy,
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            window_budget_bytes: config.window_budget_bytes,
            max_in_flight_windows: config.max_in_flight_windows,
            config_version: config.config_version.clone(),
            model_id: config.model_id.clone(),
            max_windows: config.max_windows,
            journal_commit_attempts: config.journal_commit_attempts,
            shutdown_grace: config.shutdown_grace(),
            allow_oversized_messages: config.allow_oversized_messages,
            followups: FollowupPolicy::from(config),
        }
    }
}

/// A run that ended on a fatal error, with the counts reached before it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: ChroniclerError,
    pub summary: RunSummary,
}

impl From<ChroniclerError> for RunFailure {
    fn from(error: ChroniclerError) -> Self {
        Self {
            error,
            summary: RunSummary::default(),
        }
    }
}

struct Attempt {
    window: Window,
    signature: Signature,
    outcome: Result<GenerationResponse, CallError>,
}

pub struct PipelineRunner {
    journal: Arc<dyn JournalStore>,
    tasks: Arc<dyn TaskStore>,
    caller: Arc<RateLimitedCaller>,
    settings: PipelineSettings,
}

impl PipelineRunner {
    pub fn new(
        journal: Arc<dyn JournalStore>,
        tasks: Arc<dyn TaskStore>,
        caller: Arc<RateLimitedCaller>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            journal,
            tasks,
            caller,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Rejects inputs the run cannot handle before any window is attempted.
    ///
    /// A message larger than the whole budget is refused unless
    /// `allow_oversized_messages` is set.
    pub fn check_input(&self, messages: &[Message]) -> Result<(), ChroniclerError> {
        let budget = self.settings.window_budget_bytes;
        if budget == 0 {
            return Err(ChroniclerError::Config(
                "window_budget_bytes must be greater than 0".into(),
            ));
        }
        if self.settings.allow_oversized_messages {
            return Ok(());
        }
        match largest_message(messages) {
            Some(m) if m.byte_size > budget => Err(ChroniclerError::Config(format!(
                "message from `{}` at {} is {} bytes, larger than window_budget_bytes ({budget}); \
                 raise the budget or set pipeline.allow_oversized_messages",
                m.author_id,
                format_timestamp(&m.timestamp),
                m.byte_size,
            ))),
            _ => Ok(()),
        }
    }

    /// Drives every window of `messages` to a terminal state.
    ///
    /// Only journal lookups that fail, journal commits that keep failing, and
    /// invalid input end the run with an error; the error carries the counts
    /// reached so far. On cancellation no new windows are started; calls
    /// already in flight get the shutdown grace period before they are
    /// aborted.
    pub async fn run(
        &self,
        messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RunFailure> {
        let deadline = GraceDeadline::arm(cancel, self.settings.shutdown_grace);
        self.run_within(messages, cancel, &deadline).await
    }

    /// Like [`run`](Self::run), with in-flight calls bounded by a grace
    /// period the caller shares with other shutdown work.
    pub async fn run_within(
        &self,
        messages: Vec<Message>,
        cancel: &CancellationToken,
        deadline: &GraceDeadline,
    ) -> Result<RunSummary, RunFailure> {
        self.check_input(&messages)?;
        let windows = pack(messages, self.settings.window_budget_bytes)
            .map_err(|e| ChroniclerError::Config(e.to_string()))?;
        let mut queue: VecDeque<Window> = windows.into();

        let limit = self.settings.max_windows;
        if limit > 0 {
            if limit < 5 {
                warn!(max_windows = limit, "max_windows is very low; most input will be left for later runs");
            }
            if queue.len() > limit {
                info!(total = queue.len(), max_windows = limit, "limiting run to the first windows");
                queue.truncate(limit);
            }
        }
        info!(windows = queue.len(), budget = self.settings.window_budget_bytes, "windows packed");

        let abort = deadline.abort_token();
        let max_in_flight = self.settings.max_in_flight_windows.max(1);
        let mut summary = RunSummary::default();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < max_in_flight && !cancel.is_cancelled() {
                let Some(window) = queue.pop_front() else {
                    break;
                };
                let signature = Signature::compute(
                    &window,
                    &self.settings.config_version,
                    &self.settings.model_id,
                );
                let journaled = self
                    .journal
                    .lookup(&signature)
                    .await
                    .map_err(|error| RunFailure { error, summary })?;
                if let Some(entry) = journaled {
                    summary.skipped += 1;
                    recording::record_window("skipped");
                    info!(
                        signature = signature.short(),
                        window = %window.label(),
                        result = %entry.result_reference,
                        "window already journaled; skipping"
                    );
                    continue;
                }
                debug!(
                    signature = signature.short(),
                    window = %window.label(),
                    messages = window.len(),
                    bytes = window.byte_total(),
                    "attempting window"
                );
                in_flight.push(self.attempt(window, signature, abort));
            }

            let Some(attempt) = in_flight.next().await else {
                break;
            };
            self.settle(attempt, &mut queue, &mut summary)
                .await
                .map_err(|error| RunFailure { error, summary })?;
        }

        if cancel.is_cancelled() {
            summary.cancelled = true;
            warn!(remaining = queue.len(), "run cancelled; unfinished windows are left for the next run");
        }
        info!(%summary, "window processing finished");
        Ok(summary)
    }

    async fn attempt(
        &self,
        window: Window,
        signature: Signature,
        abort: &CancellationToken,
    ) -> Attempt {
        let request = GenerationRequest::for_window(&window, &signature, &self.settings.model_id);
        let outcome = self.caller.call(&request, abort).await;
        Attempt {
            window,
            signature,
            outcome,
        }
    }

    async fn settle(
        &self,
        attempt: Attempt,
        queue: &mut VecDeque<Window>,
        summary: &mut RunSummary,
    ) -> Result<(), ChroniclerError> {
        let Attempt {
            window,
            signature,
            outcome,
        } = attempt;

        match outcome {
            Ok(response) => {
                self.commit(&signature, &response.result_reference).await?;
                summary.processed += 1;
                recording::record_window("processed");
                info!(
                    signature = signature.short(),
                    window = %window.label(),
                    result = %response.result_reference,
                    "window processed"
                );
                self.enqueue_followups(&window, &signature, &response, summary)
                    .await;
            }
            Err(CallError::Overflow {
                request_bytes,
                limit,
            }) => {
                let messages = window.len();
                match split(window) {
                    Ok((left, right)) => {
                        summary.split += 1;
                        recording::record_window("split");
                        warn!(
                            signature = signature.short(),
                            messages,
                            request_bytes,
                            ?limit,
                            "window overflowed; splitting"
                        );
                        queue.push_front(right);
                        queue.push_front(left);
                    }
                    Err(e) => {
                        summary.unsplittable += 1;
                        recording::record_window("unsplittable");
                        error!(
                            signature = signature.short(),
                            request_bytes,
                            error = %e,
                            "message exceeds the service limit on its own; skipping it"
                        );
                    }
                }
            }
            Err(CallError::Cancelled) => {
                warn!(
                    signature = signature.short(),
                    window = %window.label(),
                    "window interrupted by cancellation; not journaled"
                );
            }
            Err(e) => {
                summary.failed += 1;
                recording::record_window("failed");
                error!(
                    signature = signature.short(),
                    window = %window.label(),
                    error = %e,
                    "window failed; it will be retried on the next run"
                );
            }
        }
        Ok(())
    }

    /// Journals a signature, retrying a bounded number of times.
    async fn commit(
        &self,
        signature: &Signature,
        result_reference: &str,
    ) -> Result<(), ChroniclerError> {
        let attempts = self.settings.journal_commit_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.journal.commit(signature, result_reference).await {
                Ok(CommitOutcome::Committed) => return Ok(()),
                Ok(CommitOutcome::AlreadyCommitted) => {
                    debug!(signature = signature.short(), "signature was already journaled");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    warn!(signature = signature.short(), attempt, error = %e, "journal commit failed; retrying");
                    tokio::time::sleep(COMMIT_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        signature = %signature,
                        result = result_reference,
                        attempts,
                        error = %e,
                        "journal commit failed; output exists but is not journaled"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn enqueue_followups(
        &self,
        window: &Window,
        signature: &Signature,
        response: &GenerationResponse,
        summary: &mut RunSummary,
    ) {
        for payload in derive_tasks(window, signature, response, self.settings.followups) {
            match self.tasks.enqueue(&payload).await {
                Ok(task_id) => {
                    summary.tasks_enqueued += 1;
                    recording::record_task("enqueued");
                    debug!(%task_id, kind = %payload.kind(), "follow-up task enqueued");
                }
                Err(e) => {
                    summary.enqueue_failures += 1;
                    recording::record_task("enqueue_failed");
                    warn!(
                        signature = signature.short(),
                        kind = %payload.kind(),
                        error = %e,
                        "could not enqueue follow-up task; dropping it"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tracing_test::traced_test;

    use chronicler_core::{
        AdapterType, Credential, GenerationError, HealthStatus, JournalEntry, JournalStatus,
        PluginAdapter, Task, TaskCounts, TaskPayload,
    };
    use chronicler_resilience::{Backoff, CallerSettings, CredentialLimiter, CredentialPool};

    use super::*;

    #[derive(Default)]
    struct MemoryJournal {
        entries: Mutex<HashMap<String, String>>,
        failing_commits: AtomicU32,
        /// Commits that succeed before every later one fails.
        healthy_commits: Option<AtomicU32>,
        lookups_fail: bool,
    }

    #[async_trait]
    impl JournalStore for MemoryJournal {
        async fn lookup(&self, signature: &Signature) -> Result<Option<JournalEntry>, ChroniclerError> {
            if self.lookups_fail {
                return Err(ChroniclerError::storage("journal unavailable"));
            }
            let entries = self.entries.lock().unwrap();
            Ok(entries.get(signature.as_str()).map(|r| JournalEntry {
                signature: signature.clone(),
                status: JournalStatus::Done,
                result_reference: r.clone(),
                created_at: Utc::now(),
            }))
        }

        async fn commit(
            &self,
            signature: &Signature,
            result_reference: &str,
        ) -> Result<CommitOutcome, ChroniclerError> {
            let failing = self
                .failing_commits
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            let outage = self.healthy_commits.as_ref().is_some_and(|healthy| {
                healthy
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_err()
            });
            if failing || outage {
                return Err(ChroniclerError::storage("database is locked"));
            }
            let mut entries = self.entries.lock().unwrap();
            if entries.contains_key(signature.as_str()) {
                return Ok(CommitOutcome::AlreadyCommitted);
            }
            entries.insert(signature.to_string(), result_reference.to_string());
            Ok(CommitOutcome::Committed)
        }

        async fn journal_count(&self) -> Result<u64, ChroniclerError> {
            Ok(self.entries.lock().unwrap().len() as u64)
        }
    }

    #[derive(Default)]
    struct MemoryTasks {
        payloads: Mutex<Vec<TaskPayload>>,
        offline: bool,
    }

    impl MemoryTasks {
        fn check(&self) -> Result<(), ChroniclerError> {
            if self.offline {
                Err(ChroniclerError::storage("task queue offline"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl TaskStore for MemoryTasks {
        async fn enqueue(&self, payload: &TaskPayload) -> Result<String, ChroniclerError> {
            self.check()?;
            let mut payloads = self.payloads.lock().unwrap();
            payloads.push(payload.clone());
            Ok(format!("task-{}", payloads.len()))
        }

        async fn lease(&self, _: &str, _: usize) -> Result<Vec<Task>, ChroniclerError> {
            self.check().map(|()| Vec::new())
        }

        async fn complete(&self, _: &str, _: &str) -> Result<(), ChroniclerError> {
            self.check()
        }

        async fn fail(&self, _: &str, _: &str, _: &str) -> Result<(), ChroniclerError> {
            self.check()
        }

        async fn dead_letter(&self, _: &str, _: &str, _: &str) -> Result<(), ChroniclerError> {
            self.check()
        }

        async fn get_task(&self, _: &str) -> Result<Option<Task>, ChroniclerError> {
            self.check().map(|()| None)
        }

        async fn task_counts(&self) -> Result<TaskCounts, ChroniclerError> {
            self.check().map(|()| TaskCounts::default())
        }
    }

    struct Echo;

    #[async_trait]
    impl PluginAdapter for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }

        fn adapter_type(&self) -> AdapterType {
            AdapterType::Generator
        }

        async fn health_check(&self) -> Result<HealthStatus, ChroniclerError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl chronicler_core::GenerationService for Echo {
        async fn generate(
            &self,
            request: &GenerationRequest,
            _: &Credential,
        ) -> Result<GenerationResponse, GenerationError> {
            Ok(GenerationResponse {
                result_reference: format!("ref/{}", request.key),
                artifacts: Vec::new(),
            })
        }
    }

    struct Unlimited;

    #[async_trait]
    impl CredentialLimiter for Unlimited {
        fn try_acquire(&self) -> bool {
            true
        }

        async fn acquire(&self) {}
    }

    fn settings(budget: usize) -> PipelineSettings {
        PipelineSettings {
            window_budget_bytes: budget,
            max_in_flight_windows: 1,
            config_version: "v1".into(),
            model_id: "test-model".into(),
            max_windows: 0,
            journal_commit_attempts: 3,
            shutdown_grace: Duration::ZERO,
            allow_oversized_messages: false,
            followups: FollowupPolicy {
                banners: false,
                profiles: true,
                urls: false,
            },
        }
    }

    fn runner(
        journal: Arc<MemoryJournal>,
        tasks: Arc<MemoryTasks>,
        settings: PipelineSettings,
    ) -> PipelineRunner {
        let limiter: Arc<dyn CredentialLimiter> = Arc::new(Unlimited);
        let pool = CredentialPool::new([(Credential::new("c1", "t"), limiter)]).unwrap();
        let caller = RateLimitedCaller::new(
            Arc::new(Echo),
            pool,
            CallerSettings {
                max_attempts: 1,
                backoff: Backoff::fixed(Duration::from_millis(1), Duration::from_millis(1)),
                capacity_wait: Duration::from_secs(1),
            },
        );
        PipelineRunner::new(journal, tasks, Arc::new(caller), settings)
    }

    fn messages(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                Message::new(
                    Utc.with_ymd_and_hms(2026, 4, 1, 8, i as u32, 0).unwrap(),
                    "alice",
                    "0123456789",
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn zero_budget_is_rejected() {
        let runner = runner(Default::default(), Default::default(), settings(0));
        let err = runner
            .run(messages(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.error, ChroniclerError::Config(_)));
        assert_eq!(err.summary, RunSummary::default());
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let runner = runner(Default::default(), Default::default(), settings(100));
        let summary = runner
            .run(Vec::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[tokio::test]
    async fn lookup_failure_aborts_the_run() {
        let journal = Arc::new(MemoryJournal {
            lookups_fail: true,
            ..Default::default()
        });
        let runner = runner(journal, Default::default(), settings(100));
        let err = runner
            .run(messages(2), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.error, ChroniclerError::Storage { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn commit_is_retried_within_its_bound() {
        let journal = Arc::new(MemoryJournal {
            failing_commits: AtomicU32::new(2),
            ..Default::default()
        });
        let runner = runner(journal.clone(), Default::default(), settings(100));
        let summary = runner
            .run(messages(1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(journal.journal_count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn commit_failure_past_the_bound_is_fatal() {
        let journal = Arc::new(MemoryJournal {
            failing_commits: AtomicU32::new(3),
            ..Default::default()
        });
        let runner = runner(journal.clone(), Default::default(), settings(100));
        let err = runner
            .run(messages(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.error, ChroniclerError::Storage { .. }));
        assert_eq!(journal.journal_count().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_keeps_the_counts_reached_so_far() {
        let journal = Arc::new(MemoryJournal {
            healthy_commits: Some(AtomicU32::new(1)),
            ..Default::default()
        });
        let tasks = Arc::new(MemoryTasks::default());
        // One window per message; the second commit never succeeds.
        let runner = runner(journal.clone(), tasks, settings(10));
        let failure = runner
            .run(messages(3), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, ChroniclerError::Storage { .. }));
        assert_eq!(failure.summary.processed, 1);
        assert_eq!(failure.summary.tasks_enqueued, 1);
        assert!(!failure.summary.cancelled);
        assert_eq!(journal.journal_count().await.unwrap(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn enqueue_failures_are_counted_not_fatal() {
        let tasks = Arc::new(MemoryTasks {
            offline: true,
            ..Default::default()
        });
        let journal = Arc::new(MemoryJournal::default());
        // 10-byte messages and a 10-byte budget give one window per message.
        let runner = runner(journal.clone(), tasks, settings(10));
        let summary = runner
            .run(messages(3), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.tasks_enqueued, 0);
        assert_eq!(summary.enqueue_failures, 3);
        assert_eq!(journal.journal_count().await.unwrap(), 3);
        assert!(logs_contain("could not enqueue follow-up task"));
    }

    #[tokio::test]
    #[traced_test]
    async fn journaled_window_is_skipped() {
        let journal = Arc::new(MemoryJournal::default());
        let tasks = Arc::new(MemoryTasks::default());
        let input = messages(1);
        let window = Window::new(input.clone()).unwrap();
        let signature = Signature::compute(&window, "v1", "test-model");
        journal.commit(&signature, "earlier").await.unwrap();

        let runner = runner(journal, tasks.clone(), settings(100));
        let summary = runner
            .run(input, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 0);
        assert!(tasks.payloads.lock().unwrap().is_empty());
        assert!(logs_contain("window already journaled; skipping"));
    }

    #[tokio::test]
    async fn followups_are_enqueued_per_processed_window() {
        let tasks = Arc::new(MemoryTasks::default());
        let runner = runner(Default::default(), tasks.clone(), settings(100));
        let summary = runner
            .run(messages(2), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.tasks_enqueued, 1);
        let payloads = tasks.payloads.lock().unwrap();
        assert!(matches!(
            &payloads[0],
            TaskPayload::UpdateProfile { author_id, .. } if author_id == "alice"
        ));
    }
}
