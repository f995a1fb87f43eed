// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

// Main entry point for the CloudWatcher driver daemon

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use rust_cloudwatcher::config::Config;
use rust_cloudwatcher::conversion::DeviceConstants;
use rust_cloudwatcher::daemon::Daemon;
use rust_cloudwatcher::protocol::CloudWatcher;
use rust_cloudwatcher::transport::{Link, Transport};

/// Driver daemon for the Lunatico AAG CloudWatcher weather station
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (created with defaults if missing)
    #[arg(short, long, default_value = "cloudwatcher.yaml")]
    config: PathBuf,

    /// Device port: serial path or udp://host:port (overrides config)
    #[arg(long)]
    port: Option<String>,

    /// Serial baud rate (overrides config)
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Refresh interval in seconds (overrides config)
    #[arg(long)]
    refresh: Option<f64>,

    /// Write the latest report as JSON to this file every cycle
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("cannot load configuration from {:?}", args.config))?;
    config.apply_args(args.port, args.baud_rate, args.refresh);

    let link = if config.connection.is_udp() {
        let addr = config
            .connection
            .udp_address()
            .context("invalid udp:// endpoint")?;
        info!("connecting to network device at {}", addr);
        Link::open_udp(addr)?
    } else {
        info!(
            "opening serial port {} at {} baud",
            config.connection.port, config.connection.baud_rate
        );
        Link::open_serial(&config.connection.port, config.connection.baud_rate)?
    };

    let (device, device_info) = CloudWatcher::handshake(Transport::new(link))
        .context("CloudWatcher handshake failed")?;
    info!(
        "connected to {} (firmware {}, serial {})",
        device_info.model, device_info.firmware, device_info.serial_number
    );

    let constants = match device.electrical_constants()? {
        Some(electrical) => DeviceConstants::with_electrical(electrical),
        None => {
            info!("firmware predates electrical constants, using defaults");
            DeviceConstants::default()
        }
    };

    let has_anemometer = device.anemometer_present()?;
    if has_anemometer {
        info!("anemometer detected ({:?})", config.connection.anemometer);
    }

    let mut daemon = Daemon::new();
    daemon.launch(device, constants, config, has_anemometer, args.output);

    tokio::signal::ctrl_c().await?;
    daemon.shutdown().await?;
    info!("disconnected");
    Ok(())
}
