// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Rust CloudWatcher library
//!
//! Driver for the Lunatico AAG CloudWatcher weather station: ASCII
//! serial/UDP protocol, sensor sampling and aggregation, physical-unit
//! conversion, condition classification, and the closed-loop rain-sensor
//! heater controller.

pub mod classification;
pub mod config;
pub mod conversion;
pub mod daemon;
pub mod heater;
pub mod protocol;
pub mod sampling;
pub mod transport;

use serde::Serialize;

use classification::{
    CloudCondition, HumidityCondition, RainCondition, SkyDarkness, Warnings, WindCondition,
};
use heater::HeaterState;
use protocol::SwitchState;

/// Snapshot of one completed polling cycle, published by the daemon and
/// optionally written out as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Corrected IR sky temperature in °C.
    pub sky_temperature: f64,
    /// Uncorrected IR sky temperature in °C.
    pub raw_sky_temperature: f64,
    pub ambient_temperature: f64,
    pub rain_sensor_temperature: f64,
    pub rain_frequency: f64,
    pub supply_voltage: f64,
    pub sky_brightness_kohm: f64,
    /// `None` when no anemometer is fitted.
    pub wind_speed_ms: Option<f64>,
    /// `None` when no humidity sensor is fitted.
    pub humidity: Option<f64>,
    pub dewpoint: f64,

    pub rain: RainCondition,
    pub cloud: CloudCondition,
    pub wind: WindCondition,
    pub darkness: SkyDarkness,
    pub humidity_condition: HumidityCondition,
    pub warnings: Warnings,

    pub heater_state: HeaterState,
    /// Heater power in percent, within `[min_power, 100]`.
    pub heater_power: f64,
    pub switch: Option<SwitchState>,
    pub cycle_duration_secs: f64,
}
