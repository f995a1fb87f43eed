// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Physical-unit conversions for aggregated raw codes
//!
//! Pure functions of (aggregated sample, device constants, coefficients).
//! The only state is the calibration constants loaded once at connect.
//!
//! Thermistor channels use the simplified single-beta Steinhart-Hart
//! model; the LDR channel is a plain pull-up divider reported in kOhm.

use serde::{Deserialize, Serialize};

use crate::protocol::{ElectricalConstants, NO_READING};
use crate::sampling::AggregatedSample;

pub const ABSOLUTE_ZERO: f64 = -273.15;

/// Raw ADC codes are clamped here before the divider formula, which is
/// undefined at 0 and 1023.
const RAW_MIN: f64 = 1.0;
const RAW_MAX: f64 = 1022.0;

/// Ambient codes below this mean "no ambient thermistor fitted".
const AMBIENT_ABSENT: f64 = -200.0;

/// Calibration constants for the analog channels. The electrical group
/// comes from the device (`M!`); the ambient thermistor has no on-device
/// calibration and uses fixed defaults.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConstants {
    pub zener_voltage: f64,
    pub ldr_max_resistance: f64,
    pub ldr_pullup_resistance: f64,
    pub rain_beta: f64,
    pub rain_res_at_25: f64,
    pub rain_pullup_resistance: f64,
    pub ambient_beta: f64,
    pub ambient_res_at_25: f64,
    pub ambient_pullup_resistance: f64,
}

impl Default for DeviceConstants {
    fn default() -> Self {
        DeviceConstants {
            zener_voltage: 3.0,
            ldr_max_resistance: 1744.0,
            ldr_pullup_resistance: 56.0,
            rain_beta: 3450.0,
            rain_res_at_25: 1.0,
            rain_pullup_resistance: 1.0,
            ambient_beta: 3811.0,
            ambient_res_at_25: 10.0,
            ambient_pullup_resistance: 9.9,
        }
    }
}

impl DeviceConstants {
    /// Overlay the electrical group read from the device onto the fixed
    /// ambient defaults.
    pub fn with_electrical(electrical: ElectricalConstants) -> Self {
        DeviceConstants {
            zener_voltage: electrical.zener_voltage,
            ldr_max_resistance: electrical.ldr_max_resistance,
            ldr_pullup_resistance: electrical.ldr_pullup_resistance,
            rain_beta: electrical.rain_beta,
            rain_res_at_25: electrical.rain_res_at_25,
            rain_pullup_resistance: electrical.rain_pullup_resistance,
            ..Default::default()
        }
    }
}

/// K1..K5 polynomial constants for the sky-temperature correction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SkyCorrectionCoefficients {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
}

impl Default for SkyCorrectionCoefficients {
    fn default() -> Self {
        SkyCorrectionCoefficients {
            k1: 33.0,
            k2: 0.0,
            k3: 4.0,
            k4: 100.0,
            k5: 100.0,
        }
    }
}

/// Resistance seen through the 10-bit pull-up divider, in the pull-up's
/// unit (kOhm here).
fn divider_resistance(raw: f64, pullup: f64) -> f64 {
    let raw = raw.clamp(RAW_MIN, RAW_MAX);
    pullup / (1023.0 / raw - 1.0)
}

/// Simplified single-beta Steinhart-Hart: resistance to °C.
fn steinhart_hart(resistance: f64, beta: f64, res_at_25: f64) -> f64 {
    1.0 / ((resistance / res_at_25).ln() / beta + 1.0 / (273.15 + 25.0)) - 273.15
}

/// Rain-sensor thermistor temperature in °C.
pub fn rain_sensor_temperature(raw: f64, constants: &DeviceConstants) -> f64 {
    let r = divider_resistance(raw, constants.rain_pullup_resistance);
    steinhart_hart(r, constants.rain_beta, constants.rain_res_at_25)
}

/// Ambient temperature in °C. Falls back to the RH-sensor temperature,
/// then to the IR sensor temperature, when no ambient thermistor is
/// fitted.
pub fn ambient_temperature(sample: &AggregatedSample, constants: &DeviceConstants) -> f64 {
    if sample.ambient_raw > AMBIENT_ABSENT {
        let r = divider_resistance(sample.ambient_raw, constants.ambient_pullup_resistance);
        steinhart_hart(r, constants.ambient_beta, constants.ambient_res_at_25)
    } else if sample.rh_temperature > NO_READING {
        sample.rh_temperature
    } else {
        sample.sensor_ir / 100.0
    }
}

/// Power supply voltage derived from the zener reference.
pub fn supply_voltage(raw: f64, constants: &DeviceConstants) -> f64 {
    let raw = raw.clamp(RAW_MIN, RAW_MAX);
    1023.0 * constants.zener_voltage / raw
}

/// Sky brightness as the LDR resistance in kOhm (dark sky = high
/// resistance). No thermistor curve applies here.
pub fn sky_brightness(ldr_raw: f64, constants: &DeviceConstants) -> f64 {
    divider_resistance(ldr_raw, constants.ldr_pullup_resistance)
        .min(constants.ldr_max_resistance)
}

/// IR sky temperature corrected for the sensor's own temperature:
/// `corrected = sky - [(K1/100)(ir - K2/10) + (K3/100) e^(K4/1000 ir)^(K5/100)]`,
/// all temperatures in °C.
pub fn corrected_sky_temperature(
    sky: f64,
    ir_sensor: f64,
    k: &SkyCorrectionCoefficients,
) -> f64 {
    let correction = (k.k1 / 100.0) * (ir_sensor - k.k2 / 10.0)
        + (k.k3 / 100.0) * ((k.k4 / 1000.0 * ir_sensor).exp()).powf(k.k5 / 100.0);
    sky - correction
}

/// Dewpoint in °C from ambient temperature and relative humidity.
/// Without a humidity reading the dewpoint pins to absolute zero and
/// humidity reports as 0.
pub fn dewpoint(ambient: f64, humidity: f64) -> (f64, f64) {
    if humidity > NO_READING {
        let rh = humidity.clamp(0.0, 100.0);
        (ambient - (100.0 - rh) / 5.0, rh)
    } else {
        (ABSOLUTE_ZERO, 0.0)
    }
}
