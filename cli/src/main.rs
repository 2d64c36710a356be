// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Hybrid Coordinator CLI
//!
//! The `hcoord` binary runs the coordinator service and inspects its
//! configuration.
//!
//! ## Commands
//!
//! - `hcoord serve` (default) - Run the HTTP API and background workers
//! - `hcoord config show|validate|generate` - Configuration management
//! - `hcoord status` - Query a running coordinator

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hybrid_coordinator::commands::{self, ConfigCommand};
use hybrid_coordinator_core::domain::coordinator_config::{CoordinatorConfigManifest, LogFormat};

/// Hybrid Context & Resilience Coordinator
#[derive(Parser)]
#[command(name = "hcoord")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "HCOORD_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true, env = "HCOORD_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator
    #[command(name = "serve")]
    Serve {
        /// Override the configured listen port
        #[arg(long, env = "HCOORD_PORT")]
        port: Option<u16>,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Show health and circuit state of a running coordinator
    #[command(name = "status")]
    Status {
        /// Base URL of the coordinator
        #[arg(long, env = "HCOORD_URL", default_value = "http://127.0.0.1:8091")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { command }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), LogFormat::Text)?;
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Status { url }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), LogFormat::Text)?;
            commands::status::handle_command(&url).await
        }
        Some(Commands::Serve { port }) => serve(cli.config, cli.log_level, port).await,
        None => serve(cli.config, cli.log_level, None).await,
    }
}

async fn serve(config_path: Option<PathBuf>, log_level: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config =
        CoordinatorConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    if let Some(port) = port {
        config.spec.server.port = port;
    }

    let logging = &config.spec.observability.logging;
    init_logging(log_level.as_deref().unwrap_or(&logging.level), logging.format)?;

    commands::serve::run(config).await
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
