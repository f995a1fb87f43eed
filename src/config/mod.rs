// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Configuration management for the CloudWatcher driver
//!
//! The configuration is backed by a YAML file with one section per
//! concern:
//! - `connection`: device endpoint, baud rate, refresh interval
//! - `thresholds`: classification threshold ladders and warning limits
//! - `sky_correction`: K1..K5 sky-temperature correction coefficients
//! - `heater`: rain-sensor heater tuning
//!
//! Every section has defaults, so an empty file is a valid
//! configuration. A missing file is created with the defaults on first
//! load.

pub mod connection;
pub mod heater;
pub mod thresholds;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

pub use connection::ConnectionConfig;
pub use heater::HeaterConfig;
pub use thresholds::ThresholdsConfig;

use crate::conversion::SkyCorrectionCoefficients;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    #[serde(default)]
    pub sky_correction: SkyCorrectionCoefficients,

    #[serde(default)]
    pub heater: HeaterConfig,
}

impl Config {
    /// Load configuration from a file, creating one with the default
    /// values if it does not exist yet.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let config: Config = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        Ok(config)
    }

    /// Save the configuration to a file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line overrides on top of the loaded file.
    pub fn apply_args(
        &mut self,
        port: Option<String>,
        baud_rate: Option<u32>,
        refresh: Option<f64>,
    ) {
        if let Some(port) = port {
            self.connection.port = port;
        }
        if let Some(baud_rate) = baud_rate {
            self.connection.baud_rate = baud_rate;
        }
        if let Some(refresh) = refresh {
            self.connection.refresh = refresh;
        }
    }
}
