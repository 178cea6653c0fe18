// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Chronicler configuration system.

use chronicler_config::diagnostic::ConfigError;
use chronicler_config::model::ChroniclerConfig;
use chronicler_config::{load_and_validate_str, load_config_from_str};

const MINIMAL: &str = r#"
[[caller.credentials]]
name = "primary"
token = "tok-1"
"#;

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[pipeline]
window_budget_bytes = 2048
max_in_flight_windows = 4
config_version = "v7"
model_id = "writer-large"
max_windows = 12
journal_commit_attempts = 5
shutdown_grace_secs = 10
allow_oversized_messages = true
enable_banners = false
enable_profiles = true
enable_url_enrichment = false

[caller]
max_call_attempts = 4
backoff_base_ms = 100
backoff_max_ms = 1000
capacity_wait_secs = 5

[[caller.credentials]]
name = "a"
token = "tok-a"
requests_per_interval = 5
interval_secs = 60

[[caller.credentials]]
name = "b"
token = "tok-b"

[tasks]
task_worker_count = 3
task_lease_timeout_secs = 30
max_task_attempts = 2
lease_batch_size = 8
poll_interval_ms = 50

[storage]
database_path = "/tmp/chronicler-test.db"
wal_mode = false

[writer]
endpoint = "http://localhost:9000/generate"
timeout_secs = 20
max_request_bytes = 100000

[log]
level = "debug"
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.pipeline.window_budget_bytes, 2048);
    assert_eq!(config.pipeline.max_in_flight_windows, 4);
    assert_eq!(config.pipeline.config_version, "v7");
    assert_eq!(config.pipeline.max_windows, 12);
    assert!(config.pipeline.allow_oversized_messages);
    assert!(!config.pipeline.enable_banners);
    assert_eq!(config.caller.credentials.len(), 2);
    assert_eq!(config.caller.credentials[0].requests_per_interval, 5);
    assert_eq!(config.caller.credentials[1].requests_per_interval, 10);
    assert_eq!(config.caller.credentials[1].interval_secs, 60);
    assert_eq!(config.tasks.lease_batch_size, 8);
    assert_eq!(config.storage.database_path, "/tmp/chronicler-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.writer.max_request_bytes, Some(100_000));
    assert_eq!(config.log.level, "debug");
}

#[test]
fn defaults_fill_missing_sections() {
    let config = load_and_validate_str(MINIMAL).expect("minimal config is valid");
    assert_eq!(config.pipeline.window_budget_bytes, 320_000);
    assert_eq!(config.pipeline.max_in_flight_windows, 1);
    assert_eq!(config.pipeline.config_version, "v1");
    assert_eq!(config.pipeline.max_windows, 0);
    assert_eq!(config.caller.max_call_attempts, 3);
    assert_eq!(config.caller.backoff_base_ms, 500);
    assert_eq!(config.tasks.task_worker_count, 2);
    assert_eq!(config.tasks.task_lease_timeout_secs, 300);
    assert_eq!(config.tasks.max_task_attempts, 3);
    assert!(config.storage.wal_mode);
    assert_eq!(config.writer.max_request_bytes, None);
    assert_eq!(config.log.level, "info");
}

#[test]
fn default_struct_matches_empty_toml_apart_from_credentials() {
    let parsed = load_config_from_str("").expect("empty TOML deserializes");
    let default = ChroniclerConfig::default();
    assert_eq!(
        parsed.pipeline.window_budget_bytes,
        default.pipeline.window_budget_bytes
    );
    assert!(parsed.caller.credentials.is_empty());
}

#[test]
fn unknown_key_suggests_correction() {
    let toml = format!("{MINIMAL}\n[pipeline]\nwindow_budjet_bytes = 10\n");
    let errors = load_and_validate_str(&toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "window_budjet_bytes");
            assert_eq!(suggestion.as_deref(), Some("window_budget_bytes"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let toml = format!("{MINIMAL}\n[metrics]\nenabled = true\n");
    let errors = load_and_validate_str(&toml).unwrap_err();
    assert!(matches!(&errors[0], ConfigError::UnknownKey { key, .. } if key == "metrics"));
}

#[test]
fn wrong_type_is_reported() {
    let toml = format!("{MINIMAL}\n[pipeline]\nwindow_budget_bytes = \"lots\"\n");
    let errors = load_and_validate_str(&toml).unwrap_err();
    assert!(matches!(&errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn credential_without_token_is_missing_key() {
    let toml = "[[caller.credentials]]\nname = \"a\"\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(matches!(&errors[0], ConfigError::MissingKey { key } if key == "token"));
}

#[test]
fn validation_collects_all_errors() {
    let toml = r#"
[pipeline]
window_budget_bytes = 0
max_in_flight_windows = 0

[caller]
backoff_base_ms = 5000
backoff_max_ms = 100

[tasks]
max_task_attempts = 0

[log]
level = "loud"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    let has = |needle: &str| messages.iter().any(|m| m.contains(needle));
    assert!(has("window_budget_bytes"));
    assert!(has("max_in_flight_windows"));
    assert!(has("backoff_base_ms"));
    assert!(has("at least one credential"));
    assert!(has("max_task_attempts"));
    assert!(has("log.level"));
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn duplicate_credential_names_are_rejected() {
    let toml = r#"
[[caller.credentials]]
name = "same"
token = "a"

[[caller.credentials]]
name = "same"
token = "b"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("duplicate credential name"));
}

#[test]
fn zero_rate_credential_is_rejected() {
    let toml = r#"
[[caller.credentials]]
name = "slow"
token = "a"
requests_per_interval = 0
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors[0].to_string().contains("requests_per_interval"));
}
