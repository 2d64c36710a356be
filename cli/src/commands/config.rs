// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use hybrid_coordinator_core::domain::coordinator_config::{
    CoordinatorConfigManifest, MonitoredServiceConfig, VectorStoreType,
};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,

        /// Print the effective manifest as JSON
        #[arg(long, conflicts_with = "yaml")]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./hcoord-config.yaml)
        #[arg(short, long, default_value = "./hcoord-config.yaml")]
        output: PathBuf,

        /// Include example monitored services
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml, json } => show(config_override, paths, yaml, json).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, yaml: bool, json: bool) -> Result<()> {
    let config =
        CoordinatorConfigManifest::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. HCOORD_CONFIG_PATH: {}",
            std::env::var("HCOORD_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./hcoord-config.yaml");
        println!("  4. ~/.hcoord/config.yaml");
        println!("  5. /etc/hcoord/config.yaml");
        println!();
    }

    if yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Server:".bold());
    println!("  Listen: {}:{}", spec.server.bind_address, spec.server.port);
    println!("  Request timeout: {:?}", spec.server.request_timeout);
    println!();

    println!("{}", "Vector store:".bold());
    match spec.vector_store.store_type {
        VectorStoreType::Qdrant => println!(
            "  Qdrant at {}",
            spec.vector_store.url.as_deref().unwrap_or("(not set)")
        ),
        VectorStoreType::Memory => println!("  In-memory"),
    }
    println!(
        "  Search limit: {}, score threshold: {}",
        spec.vector_store.search_limit, spec.vector_store.score_threshold
    );
    println!();

    println!("{}", "Learning:".bold());
    println!("  Promotion threshold: {}", spec.learning.promotion_threshold);
    println!("  Telemetry log: {}", spec.learning.telemetry_path.display());
    println!();

    println!("{}", "Healing:".bold());
    if spec.healing.enabled {
        println!("  Interval: {:?}, cooldown: {:?}", spec.healing.interval, spec.healing.cooldown);
        if let Some(selector) = &spec.healing.label_selector {
            println!("  Label selector: {}", selector);
        }
        for service in &spec.healing.services {
            if service.dependencies.is_empty() {
                println!("  - {}", service.id);
            } else {
                println!("  - {} (after {})", service.id, service.dependencies.join(", "));
            }
        }
    } else {
        println!("  {}", "disabled".dimmed());
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = CoordinatorConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let mut config = CoordinatorConfigManifest::default();
    if with_examples {
        config.spec.healing.label_selector = Some("hcoord.monitor=true".to_string());
        config.spec.healing.services = vec![
            MonitoredServiceConfig {
                id: "qdrant".to_string(),
                dependencies: vec![],
                health_url: Some("http://127.0.0.1:6333/healthz".to_string()),
            },
            MonitoredServiceConfig {
                id: "llama-server".to_string(),
                dependencies: vec!["qdrant".to_string()],
                health_url: None,
            },
        ];
    }

    config
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}
