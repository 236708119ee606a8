//! CLI entry point for the laser control daemon.
//!
//! # Usage
//!
//! Serve the REST/WebSocket API:
//! ```bash
//! irpp-daemon serve --config config/hardware_configuration.toml
//! ```
//!
//! Validate a configuration file without touching hardware:
//! ```bash
//! irpp-daemon check-config --config config/hardware_configuration.toml
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use irpp_driver_mircat::MircatFactory;
use irpp_driver_mock::MockQclFactory;
use irpp_hardware::{load_config, AppConfig, LaserController, LinkRegistry};
use irpp_server::{serve, AppState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "irpp=info,tower_http=info";

#[derive(Parser)]
#[command(name = "irpp-daemon")]
#[command(about = "IR pump-probe laser control service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket server
    Serve {
        /// Hardware configuration file (TOML format)
        #[arg(long, env = "IRPP_CONFIG")]
        config: PathBuf,

        /// Override `[server].bind_address`
        #[arg(long)]
        bind: Option<String>,

        /// Emit logs as JSON lines
        #[arg(long)]
        json_logs: bool,
    },

    /// Load and validate a configuration file, then exit
    CheckConfig {
        /// Hardware configuration file (TOML format)
        #[arg(long, env = "IRPP_CONFIG")]
        config: PathBuf,
    },
}

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn registry() -> LinkRegistry {
    let mut registry = LinkRegistry::new();
    registry.register_factory(Box::new(MockQclFactory));
    registry.register_factory(Box::new(MircatFactory));
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            json_logs,
        } => {
            init_logging(json_logs);
            start_daemon(&config, bind).await
        }
        Commands::CheckConfig { config } => {
            init_logging(false);
            check_config(&config)
        }
    }
}

fn check_config(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    registry()
        .validate(&config.daylight_mircat)
        .context("driver configuration rejected")?;
    print_summary(&config);
    println!("✅ Configuration OK");
    Ok(())
}

fn print_summary(config: &AppConfig) {
    let laser = &config.daylight_mircat;
    let range = laser.wavenumber_range();
    println!("📄 Daylight MIRcat");
    println!("   Driver:      {}", laser.driver);
    println!("   Wavenumbers: {} - {} cm-1", range.min, range.max);
    println!("   QCL chips:   {}", laser.qcls.len().max(1));
    println!(
        "   Modes:       {}",
        laser
            .parameters
            .laser_modes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("   Bind:        {}", config.server.bind_address);
}

async fn start_daemon(path: &Path, bind: Option<String>) -> Result<()> {
    let mut config = load_config(path)?;
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }

    let registry = registry();
    registry.validate(&config.daylight_mircat)?;
    let link = registry
        .build(&config.daylight_mircat)
        .await
        .context("failed to create hardware link")?;
    info!(
        driver = %config.daylight_mircat.driver,
        types = ?registry.driver_types(),
        "Hardware link ready"
    );

    let laser = Arc::new(LaserController::new(link, config.daylight_mircat.clone()));
    let state = Arc::new(AppState::new(laser.clone(), config.server.clone()));

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    serve(state, &config.server.bind_address, shutdown).await?;

    // leave the laser safe: stop scan, emission off, disarm
    laser.disconnect().await?;
    info!("Daemon shutdown complete");
    Ok(())
}
