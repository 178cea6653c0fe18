// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chronicler - crash-safe, resumable windowed generation over message logs.
//!
//! This is the binary entry point.

mod input;
mod run;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use chronicler_config::ChroniclerConfig;

/// Chronicler - crash-safe, resumable windowed generation over message logs.
#[derive(Parser, Debug)]
#[command(name = "chronicler", version, about, long_about = None)]
struct Cli {
    /// Configuration file to load instead of the standard hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Process a JSON Lines message log.
    Run {
        /// Input file with one `{"timestamp","author_id","body"}` object per line.
        /// Use `-` for stdin.
        #[arg(long)]
        input: PathBuf,
    },
    /// Show journal, task queue, and recent run state.
    Status {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
        /// Number of recent runs to list.
        #[arg(long, default_value_t = 5)]
        runs: usize,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => chronicler_config::load_and_validate_path(path),
        None => chronicler_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            chronicler_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Run { input }) => {
            init_tracing(&config.log.level);
            match run::run_pipeline(&config, &input).await {
                Ok(summary) if summary.cancelled => std::process::exit(130),
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            }
        }
        Some(Commands::Status { json, runs }) => status::run_status(&config, json, runs).await,
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("chronicler: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("chronicler: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chronicler={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

const REDACTED: &str = "<redacted>";

/// The configuration as TOML, with every credential token replaced.
fn redacted_toml(config: &ChroniclerConfig) -> Result<String, chronicler_core::ChroniclerError> {
    let mut config = config.clone();
    for credential in &mut config.caller.credentials {
        credential.token = REDACTED.to_string();
    }
    toml::to_string_pretty(&config)
        .map_err(|e| chronicler_core::ChroniclerError::Internal(format!("cannot render config: {e}")))
}

fn print_config(config: &ChroniclerConfig) -> Result<(), chronicler_core::ChroniclerError> {
    print!("{}", redacted_toml(config)?);
    Ok(())
}
