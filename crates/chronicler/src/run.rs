// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chronicler run` command implementation.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use chronicler_config::ChroniclerConfig;
use chronicler_core::{ChroniclerError, HealthStatus, PluginAdapter};
use chronicler_pipeline::{
    GeneratingTaskHandler, Orchestrator, PipelineRunner, PipelineSettings, RunSummary,
    WorkerSettings, install_signal_handler, register_metrics,
};
use chronicler_resilience::{CallerSettings, CredentialPool, RateLimitedCaller};
use chronicler_storage::{SqliteStorage, TaskQueueSettings};
use chronicler_writer::HttpGenerator;

use crate::input;

/// Loads the input, wires every component, and runs until the windows are
/// done and the task queue is drained, or a signal arrives.
pub async fn run_pipeline(
    config: &ChroniclerConfig,
    input_path: &Path,
) -> Result<RunSummary, ChroniclerError> {
    let messages = input::read_messages(input_path)?;
    info!(messages = messages.len(), input = %input_path.display(), "input loaded");
    register_metrics();

    let storage = Arc::new(SqliteStorage::new(
        config.storage.clone(),
        TaskQueueSettings::from(&config.tasks),
    ));
    storage.initialize().await?;

    let writer = Arc::new(HttpGenerator::new(&config.writer)?);
    match writer.health_check().await {
        Ok(HealthStatus::Healthy) => debug!(endpoint = %config.writer.endpoint, "writer reachable"),
        Ok(status) => warn!(endpoint = %config.writer.endpoint, ?status, "writer health check did not pass"),
        Err(e) => warn!(endpoint = %config.writer.endpoint, error = %e, "writer health check failed"),
    }

    let pool = CredentialPool::from_config(&config.caller.credentials)?;
    info!(credentials = pool.len(), "credential pool ready");
    let caller = Arc::new(RateLimitedCaller::new(
        writer,
        pool,
        CallerSettings::from(&config.caller),
    ));

    let runner = PipelineRunner::new(
        storage.clone(),
        storage.clone(),
        caller.clone(),
        PipelineSettings::from(&config.pipeline),
    );
    let handler = Arc::new(GeneratingTaskHandler::new(
        caller,
        config.pipeline.model_id.clone(),
    ));
    let orchestrator = Orchestrator::new(
        runner,
        storage.clone(),
        storage.clone(),
        handler,
        WorkerSettings::from(&config.tasks),
    );

    let cancel = install_signal_handler();
    let result = orchestrator.execute(messages, &cancel).await;

    if let Err(e) = storage.close().await {
        warn!(error = %e, "could not close storage cleanly");
    }
    let summary = result?;
    println!("{summary}");
    Ok(summary)
}
