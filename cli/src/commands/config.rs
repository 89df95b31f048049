// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use stormnet_core::config::NetworkConfig;

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
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./stormnet.yaml)
        #[arg(short, long, default_value = "./stormnet.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, force } => generate(&output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = NetworkConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. STORMNET_CONFIG_PATH: {}",
            std::env::var("STORMNET_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./stormnet.yaml");
        println!("  4. ~/.stormnet/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!("  Network: {}", config.metadata.name);
    println!();

    println!("{}", "Sensors:".bold());
    println!("  Window size: {}", spec.sensor.window_size);
    println!(
        "  Publish interval: {} (+{}% per neighbour)",
        humantime::format_duration(spec.sensor.base_interval),
        spec.sensor.interval_neighbor_factor * 100.0
    );
    println!(
        "  Assignment timeout: {}",
        humantime::format_duration(spec.sensor.assignment_timeout)
    );
    println!();

    println!("{}", "Consensus:".bold());
    println!("  Alert threshold: {}", spec.consensus.alert_threshold);
    println!("  Neighbour scope: {:?}", spec.consensus.neighbor_scope);
    println!("  Re-arm policy: {:?}", spec.consensus.rearm);
    println!();

    println!("{}", "Supervisor:".bold());
    println!("  Capacity: {} sectors", spec.supervisor.capacity);
    println!(
        "  Retry after: {}",
        humantime::format_duration(spec.supervisor.retry_after)
    );
    println!();

    println!("{}", "Feedback:".bold());
    println!("  Cooldown: {}", humantime::format_duration(spec.feedback.cooldown));
    println!(
        "  Max alerts: {} per {}",
        spec.feedback.max_alerts,
        humantime::format_duration(spec.feedback.history_window)
    );
    println!("  Scan interval: {}", humantime::format_duration(spec.feedback.scan_interval));
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = NetworkConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

/// Write the default manifest to `output`.
pub async fn generate(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    NetworkConfig::default()
        .to_yaml_file(output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
