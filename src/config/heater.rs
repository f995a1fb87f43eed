// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Rain-sensor heater tuning parameters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaterConfig {
    /// Below this ambient (°C) the desired sensor temperature is flat.
    pub temp_low: f64,
    /// Above this ambient (°C) the desired temperature tracks ambient.
    pub temp_high: f64,
    /// Desired sensor temperature (°C) at and below `temp_low`; also the
    /// floor of the linear segment.
    pub delta_low: f64,
    /// Offset over ambient (°C) at and above `temp_high`.
    pub delta_high: f64,
    /// Impulse target offset over ambient (°C).
    pub impulse_temp: f64,
    /// Length of the drying pulse in seconds.
    pub impulse_duration: f64,
    /// Continuous wetness (seconds) that triggers an impulse.
    pub impulse_cycle: f64,
    /// Lower bound of the heater power range in percent.
    pub min_power: f64,
}

impl Default for HeaterConfig {
    fn default() -> Self {
        HeaterConfig {
            temp_low: 0.0,
            temp_high: 20.0,
            delta_low: 6.0,
            delta_high: 4.0,
            impulse_temp: 10.0,
            impulse_duration: 60.0,
            impulse_cycle: 600.0,
            min_power: 10.0,
        }
    }
}
