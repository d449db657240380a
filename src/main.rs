mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use clap::Parser;
use domain::settings::{Config, ConfigError};
use infrastructure::bluetooth::{BtleplugTransport, ConnectionConfig, ConnectionManager};
use infrastructure::logging::init_logger;
use infrastructure::shutdown::{spawn_signal_listener, ShutdownCoordinator};
use presentation::cli::{self, LineInput};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Exit status after writing a fresh config template
const EXIT_CONFIG_CREATED: u8 = 2;

/// Control a Bluetooth LE RGB LED strip from the terminal
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Path to the YAML config; a template is written if it does not exist
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load_or_create(&args.config) {
        Ok(config) => config,
        Err(e @ ConfigError::TemplateCreated(_)) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_CONFIG_CREATED);
        }
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _logging_guard = match init_logger(&config.log_settings) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    info!("Starting BLE LED strip controller");
    info!(
        "Using config parameters: led_mac={} gatt_char_uuid={} connection_timeout_sec={} connection_retries={}",
        config.led_mac,
        config.gatt_char_uuid,
        config.connection_timeout_sec,
        config.connection_retries
    );

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let connection_config = ConnectionConfig::try_from(config)?;
    let transport = BtleplugTransport::new()
        .await
        .context("could not open the Bluetooth adapter")?;

    let manager = Arc::new(ConnectionManager::new(transport, connection_config));
    let shutdown = Arc::new(ShutdownCoordinator::new());
    spawn_signal_listener(shutdown.clone());

    let input = LineInput::stdin(shutdown.clone());
    cli::run(manager, shutdown, input).await
}
