//! tsmix-sim - Main entry point
//!
//! Runs the timestamp-synchronized mixer end to end against a synthetic
//! decoder and a simulated output device, then prints a report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tsmix_ao::config::{AoConfig, ConfigOverrides};
use tsmix_ao::sim;

/// Command-line arguments for tsmix-sim
#[derive(Parser, Debug)]
#[command(name = "tsmix-sim")]
#[command(about = "Timestamp-synchronized audio mixer simulation")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "TSMIX_CONFIG")]
    config: Option<PathBuf>,

    /// Output sample rate in Hz
    #[arg(long)]
    rate: Option<u32>,

    /// Samples per mixer cycle
    #[arg(long)]
    period: Option<u32>,

    /// Master volume (0.0-1.0)
    #[arg(long)]
    volume: Option<f32>,

    /// Length of generated audio in milliseconds
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        rate: args.rate,
        period_samples: args.period,
        volume: args.volume,
        duration_ms: args.duration_ms,
        log_level: args.log_level,
    };
    let config =
        AoConfig::load(args.config.as_deref(), overrides).context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.print_config {
        let text = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
        println!("{}", text);
        return Ok(());
    }

    info!(
        "Starting tsmix-sim: {:?} @ {} Hz, {} ch, period {} samples",
        config.output.sample_format,
        config.output.rate,
        config.output.channels,
        config.output.period_samples
    );

    tokio::select! {
        report = sim::run(&config) => {
            let report = report.context("Simulation failed")?;
            let text = toml::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", text);
        }
        result = signal::ctrl_c() => {
            result.context("Failed to install Ctrl+C handler")?;
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
