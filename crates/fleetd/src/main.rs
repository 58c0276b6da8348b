//! fleetd - Warehouse Robot Fleet Simulation Daemon
//!
//! Main entry point for the daemon process.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use fleet_core::{catalog, FleetConfig, Inventory};
use fleetd::{server, Fleet};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "fleetd", about = "Warehouse robot fleet simulation daemon")]
struct Cli {
    /// Path to a key=value config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the HTTP control API port.
    #[arg(long)]
    port: Option<u16>,
    /// Override the number of worker robots.
    #[arg(long)]
    robots: Option<usize>,
    /// Override the number of charging stations.
    #[arg(long)]
    stations: Option<usize>,
    /// Enable the file ingester on this request file.
    #[arg(long)]
    request_file: Option<PathBuf>,
}

fn build_config(cli: &Cli) -> Result<FleetConfig, fleet_core::config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => FleetConfig::from_file(path)?,
        None => FleetConfig::default(),
    };

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(robots) = cli.robots {
        config.robot_count = robots;
    }
    if let Some(stations) = cli.stations {
        config.station_count = stations;
    }
    if let Some(path) = &cli.request_file {
        config.request_file = Some(path.clone());
    }
    config.validate()?;
    Ok(config)
}

fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to create tokio runtime: {err}");
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        info!(
            robots = config.robot_count,
            stations = config.station_count,
            port = config.port,
            "fleetd starting"
        );

        let inventory = Inventory::new(config.capacity, catalog::initial_stock());
        let fleet = match Fleet::new(config.clone(), inventory) {
            Ok(fleet) => Arc::new(fleet),
            Err(err) => {
                error!("failed to initialize fleet: {err}");
                std::process::exit(1);
            }
        };

        if let Err(err) = fleet.start() {
            error!("failed to start fleet: {err}");
            std::process::exit(1);
        }

        let server = tokio::spawn(server::start_server(Arc::clone(&fleet), config.port));

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = fleet.cancelled() => info!("stop requested"),
        }

        fleet.stop().await;
        server.abort();

        match fleet.write_report(&config.report_path) {
            Ok(count) => info!(
                count,
                path = %config.report_path.display(),
                "final report written"
            ),
            Err(err) => error!(error = %err, "failed to write final report"),
        }
    });
}
