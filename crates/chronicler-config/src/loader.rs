// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins:
//! 1. Compiled defaults
//! 2. `/etc/chronicler/chronicler.toml`
//! 3. `$XDG_CONFIG_HOME/chronicler/chronicler.toml`
//! 4. `./chronicler.toml`
//! 5. `CHRONICLER_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChroniclerConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/chronicler/chronicler.toml";
pub(crate) const LOCAL_CONFIG: &str = "chronicler.toml";

/// Top-level sections an environment variable may address.
const SECTIONS: &[&str] = &["pipeline", "caller", "tasks", "storage", "writer", "log"];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chronicler").join("chronicler.toml"))
}

/// Figment over the standard file hierarchy and environment.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(ChroniclerConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment.merge(Toml::file(LOCAL_CONFIG)).merge(env_provider())
}

pub fn load_config() -> Result<ChroniclerConfig, figment::Error> {
    build_figment().extract()
}

/// Loads one explicit file on top of the defaults, with env overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChroniclerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChroniclerConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Loads TOML text on top of the defaults. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<ChroniclerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChroniclerConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// `CHRONICLER_PIPELINE_WINDOW_BUDGET_BYTES` becomes `pipeline.window_budget_bytes`.
///
/// Only the first underscore after a known section name is turned into a
/// dot; key names keep their own underscores.
fn env_provider() -> Env {
    Env::prefixed("CHRONICLER_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|rest| format!("{section}.{rest}"))
        })
        .unwrap_or_else(|| key.to_string())
}
