//! KNX dispatch daemon.
//!
//! Usage:
//!   cargo run -- --devices devices.json --simulate
//!
//! Loads binary sensors from the devices file, starts the telegram queue
//! with a logging transport, requests the current state of every sensor
//! and runs until Ctrl+C. Shutdown drains the queue before exiting.

use clap::Parser;
use knx_dispatch::config::{Config, DevicesConfig, load_dotenv};
use knx_dispatch::devices::{Device, Devices};
use knx_dispatch::input::simulation::run_telegram_simulation;
use knx_dispatch::queue::TelegramQueue;
use knx_dispatch::transport::LoggingTransport;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[derive(Parser)]
#[command(name = "knx-dispatch")]
#[command(about = "Telegram dispatch core for a KNX bus client")]
struct Cli {
    /// JSON file describing the binary sensors
    #[arg(long, env = "KNX_DEVICES_FILE")]
    devices: Option<PathBuf>,

    /// Inject simulated on/off telegrams for every sensor
    #[arg(long)]
    simulate: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    load_dotenv();
    init_logger();
    info!("Starting KNX dispatch");

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if cli.devices.is_some() {
        config.devices_file = cli.devices;
    }
    if cli.simulate {
        config.simulation.enabled = true;
    }

    info!("Configuration loaded:");
    info!("  Rate limit: {} ms", config.queue.rate_limit_ms);
    info!("  Devices file: {:?}", config.devices_file);
    info!("  Simulation: {}", config.simulation.enabled);

    let devices_config = match &config.devices_file {
        Some(path) => match DevicesConfig::from_file(path) {
            Ok(devices_config) => devices_config,
            Err(e) => {
                error!("Failed to load devices from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => DevicesConfig::default(),
    };

    let devices = Arc::new(Devices::new());
    let queue = TelegramQueue::new(devices.clone())
        .with_rate_limit(config.queue.rate_limit())
        .with_transport(Arc::new(LoggingTransport::new()));

    let sensors = match devices.add_from_config(&devices_config, &queue.sender()) {
        Ok(sensors) => sensors,
        Err(e) => {
            error!("Invalid devices configuration: {}", e);
            std::process::exit(1);
        }
    };
    for sensor in &sensors {
        sensor.register_device_updated_cb(|update| async move {
            info!(
                "[BinarySensor] {} is {} (counter {})",
                update.name,
                if update.state { "on" } else { "off" },
                update.counter
            );
        });
    }

    if let Err(e) = queue.start() {
        error!("Failed to start telegram queue: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = devices.sync(&queue.sender()) {
        error!("Failed to request device state: {}", e);
    }

    let simulation = config.simulation.enabled.then(|| {
        let addresses = sensors
            .iter()
            .flat_map(|sensor| sensor.state_addresses())
            .collect();
        run_telegram_simulation(
            queue.sender(),
            addresses,
            Duration::from_secs(config.simulation.interval_secs),
        )
    });

    info!("KNX dispatch is running with {} device(s)", devices.len());
    info!("  - Press Ctrl+C to exit");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    if let Some(simulation) = simulation {
        simulation.abort();
    }
    if let Err(e) = queue.stop().await {
        error!("Error during shutdown: {}", e);
    }

    info!("KNX dispatch stopped");
}
