// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Classification thresholds
//!
//! Each ladder reads top-down; boundary values classify into the
//! stricter bucket (see [`crate::classification`]).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// Rain frequency at or below which it is raining.
    pub rain_raining: f64,
    /// Rain frequency at or below which the sensor is wet.
    pub rain_wet: f64,

    /// Corrected sky temperature (°C) at or above which the sky is overcast.
    pub cloud_overcast: f64,
    /// Corrected sky temperature (°C) at or above which the sky is cloudy.
    pub cloud_cloudy: f64,

    /// Wind speed (m/s) at or above which the wind is strong.
    pub wind_strong: f64,
    /// Wind speed (m/s) at or above which the wind is moderate.
    pub wind_moderate: f64,

    /// LDR resistance (kOhm) at or above which the sky counts as dark.
    pub darkness_dark: f64,
    /// LDR resistance (kOhm) at or above which the sky counts as dim.
    pub darkness_dim: f64,

    /// Relative humidity (%) at or above which conditions are very humid.
    pub humidity_very_humid: f64,
    /// Relative humidity (%) at or above which conditions are humid.
    pub humidity_humid: f64,

    /// Dew warning: ambient within this many °C of the dewpoint.
    pub dew_gap: f64,
    /// Wind warning limit in m/s.
    pub wind_warning: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        ThresholdsConfig {
            rain_raining: 400.0,
            rain_wet: 1700.0,
            cloud_overcast: 0.0,
            cloud_cloudy: -15.0,
            wind_strong: 11.0,
            wind_moderate: 5.5,
            darkness_dark: 50.0,
            darkness_dim: 10.0,
            humidity_very_humid: 90.0,
            humidity_humid: 75.0,
            dew_gap: 2.0,
            wind_warning: 10.0,
        }
    }
}
