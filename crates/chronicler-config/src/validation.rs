// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks serde attributes cannot express.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::ChroniclerConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates a deserialized configuration.
///
/// Collects every violation instead of stopping at the first one.
pub fn validate_config(config: &ChroniclerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let pipeline = &config.pipeline;

    if pipeline.window_budget_bytes == 0 {
        errors.push(ConfigError::validation(
            "pipeline.window_budget_bytes must be greater than 0",
        ));
    }
    if pipeline.max_in_flight_windows == 0 {
        errors.push(ConfigError::validation(
            "pipeline.max_in_flight_windows must be at least 1",
        ));
    }
    if pipeline.config_version.trim().is_empty() {
        errors.push(ConfigError::validation(
            "pipeline.config_version must not be empty",
        ));
    }
    if pipeline.model_id.trim().is_empty() {
        errors.push(ConfigError::validation("pipeline.model_id must not be empty"));
    }
    if pipeline.journal_commit_attempts == 0 {
        errors.push(ConfigError::validation(
            "pipeline.journal_commit_attempts must be at least 1",
        ));
    }

    let caller = &config.caller;
    if caller.max_call_attempts == 0 {
        errors.push(ConfigError::validation(
            "caller.max_call_attempts must be at least 1",
        ));
    }
    if caller.backoff_base_ms > caller.backoff_max_ms {
        errors.push(ConfigError::validation(format!(
            "caller.backoff_base_ms ({}) must not exceed caller.backoff_max_ms ({})",
            caller.backoff_base_ms, caller.backoff_max_ms
        )));
    }
    if caller.credentials.is_empty() {
        errors.push(ConfigError::validation(
            "caller.credentials must list at least one credential",
        ));
    }
    let mut names = HashSet::new();
    for credential in &caller.credentials {
        if credential.name.trim().is_empty() {
            errors.push(ConfigError::validation(
                "caller.credentials: name must not be empty",
            ));
        } else if !names.insert(credential.name.as_str()) {
            errors.push(ConfigError::validation(format!(
                "caller.credentials: duplicate credential name `{}`",
                credential.name
            )));
        }
        if credential.token.is_empty() {
            errors.push(ConfigError::validation(format!(
                "caller.credentials `{}`: token must not be empty",
                credential.name
            )));
        }
        if credential.requests_per_interval == 0 {
            errors.push(ConfigError::validation(format!(
                "caller.credentials `{}`: requests_per_interval must be at least 1",
                credential.name
            )));
        }
        if credential.interval_secs == 0 {
            errors.push(ConfigError::validation(format!(
                "caller.credentials `{}`: interval_secs must be at least 1",
                credential.name
            )));
        }
    }

    let tasks = &config.tasks;
    if tasks.task_lease_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "tasks.task_lease_timeout_secs must be greater than 0",
        ));
    }
    if tasks.max_task_attempts == 0 {
        errors.push(ConfigError::validation(
            "tasks.max_task_attempts must be at least 1",
        ));
    }
    if tasks.lease_batch_size == 0 {
        errors.push(ConfigError::validation(
            "tasks.lease_batch_size must be at least 1",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.writer.endpoint.trim().is_empty() {
        errors.push(ConfigError::validation("writer.endpoint must not be empty"));
    }
    if config.writer.max_request_bytes == Some(0) {
        errors.push(ConfigError::validation(
            "writer.max_request_bytes must be greater than 0 when set",
        ));
    }

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "log.level `{}` is not one of {}",
            config.log.level,
            LOG_LEVELS.join(", ")
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
