// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for Chronicler.
//!
//! TOML files in the XDG hierarchy are merged with `CHRONICLER_*` environment
//! overrides, rejected on unknown keys, and validated before use. Errors come
//! back as miette diagnostics with typo suggestions.
//!
//! ```no_run
//! use chronicler_config::{load_and_validate, render_errors};
//!
//! match load_and_validate() {
//!     Ok(config) => println!("budget: {}", config.pipeline.window_budget_bytes),
//!     Err(errors) => render_errors(&errors),
//! }
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    CallerConfig, ChroniclerConfig, CredentialConfig, LogConfig, PipelineConfig, StorageConfig,
    TaskConfig, WriterConfig,
};

/// Loads configuration from the standard hierarchy and validates it.
pub fn load_and_validate() -> Result<ChroniclerConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => validated(config),
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            &collect_toml_sources(),
        )),
    }
}

/// Loads an explicit file (plus env overrides) and validates it.
pub fn load_and_validate_path(
    path: &std::path::Path,
) -> Result<ChroniclerConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path) {
        Ok(config) => validated(config),
        Err(err) => {
            let sources = std::fs::read_to_string(path)
                .map(|content| vec![(path.display().to_string(), content)])
                .unwrap_or_default();
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Loads TOML text and validates it.
pub fn load_and_validate_str(toml_content: &str) -> Result<ChroniclerConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => validated(config),
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

fn validated(config: ChroniclerConfig) -> Result<ChroniclerConfig, Vec<ConfigError>> {
    validation::validate_config(&config)?;
    Ok(config)
}

/// Reads whichever hierarchy files exist, for span resolution.
fn collect_toml_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|d| d.join(loader::LOCAL_CONFIG))
        .unwrap_or_else(|_| loader::LOCAL_CONFIG.into());
    [
        Some(local),
        loader::user_config_path(),
        Some(loader::SYSTEM_CONFIG.into()),
    ]
    .into_iter()
    .flatten()
    .filter_map(|path| {
        std::fs::read_to_string(&path)
            .ok()
            .map(|content| (path.display().to_string(), content))
    })
    .collect()
}
