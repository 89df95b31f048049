// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

//! # stormnet CLI
//!
//! The `stormnet` binary hosts a complete sensing network in one process:
//! a monitor and any number of sensor agents talking over the in-memory
//! broker.
//!
//! ## Commands
//!
//! - `stormnet simulate --sensors N --duration D [--crash K]` - Run a network
//! - `stormnet config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use tracing::{debug, info};

use stormnet::commands::{self, ConfigCommand, SimulateArgs};

/// stormnet - cooperative storm detection across six sectors
#[derive(Parser)]
#[command(name = "stormnet")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "STORMNET_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "STORMNET_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true, env = "STORMNET_METRICS_PORT")]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a monitor and sensors in-process
    #[command(name = "simulate")]
    Simulate(SimulateArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;
    if let Ok(path) = dotenv {
        debug!("Loaded environment from {:?}", path);
    }

    if let Some(port) = cli.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics exporter listening on :{}/metrics", port);
    }

    match cli.command {
        Some(Commands::Simulate(args)) => commands::simulate::handle_command(args, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
