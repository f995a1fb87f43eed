// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Condition classification
//!
//! Each sensor channel maps to exactly one of a small set of mutually
//! exclusive states via an ordered threshold ladder. Boundary values
//! always belong to the stricter (worse) bucket. Channels whose sensor
//! is absent report an idle state; the boolean warning flags report
//! `None` in that case.

use serde::{Deserialize, Serialize};

use crate::config::ThresholdsConfig;
use crate::conversion::ABSOLUTE_ZERO;
use crate::protocol::NO_READING;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RainCondition {
    Raining,
    Wet,
    Dry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudCondition {
    Overcast,
    Cloudy,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindCondition {
    /// No anemometer fitted.
    Idle,
    Strong,
    Moderate,
    Calm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkyDarkness {
    Dark,
    Dim,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HumidityCondition {
    /// No humidity sensor fitted.
    Idle,
    VeryHumid,
    Humid,
    Normal,
}

/// Single-threshold boolean alerts. `None` means the backing sensor is
/// absent.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Warnings {
    pub dew: Option<bool>,
    pub rain: Option<bool>,
    pub wind: Option<bool>,
}

/// Rain frequency drops as the sensor gets wetter.
pub fn classify_rain(frequency: f64, t: &ThresholdsConfig) -> RainCondition {
    if frequency <= t.rain_raining {
        RainCondition::Raining
    } else if frequency <= t.rain_wet {
        RainCondition::Wet
    } else {
        RainCondition::Dry
    }
}

/// A warm (corrected) sky means cloud cover radiating back down.
pub fn classify_cloud(corrected_sky: f64, t: &ThresholdsConfig) -> CloudCondition {
    if corrected_sky >= t.cloud_overcast {
        CloudCondition::Overcast
    } else if corrected_sky >= t.cloud_cloudy {
        CloudCondition::Cloudy
    } else {
        CloudCondition::Clear
    }
}

pub fn classify_wind(wind_ms: f64, t: &ThresholdsConfig) -> WindCondition {
    if wind_ms <= NO_READING {
        WindCondition::Idle
    } else if wind_ms >= t.wind_strong {
        WindCondition::Strong
    } else if wind_ms >= t.wind_moderate {
        WindCondition::Moderate
    } else {
        WindCondition::Calm
    }
}

/// LDR resistance in kOhm grows as the sky darkens.
pub fn classify_sky_darkness(brightness_kohm: f64, t: &ThresholdsConfig) -> SkyDarkness {
    if brightness_kohm >= t.darkness_dark {
        SkyDarkness::Dark
    } else if brightness_kohm >= t.darkness_dim {
        SkyDarkness::Dim
    } else {
        SkyDarkness::Light
    }
}

pub fn classify_humidity(humidity: f64, t: &ThresholdsConfig) -> HumidityCondition {
    if humidity <= NO_READING {
        HumidityCondition::Idle
    } else if humidity >= t.humidity_very_humid {
        HumidityCondition::VeryHumid
    } else if humidity >= t.humidity_humid {
        HumidityCondition::Humid
    } else {
        HumidityCondition::Normal
    }
}

/// Evaluate the three warning flags.
///
/// - dew: ambient within `dew_gap` °C of the dewpoint (needs humidity)
/// - rain: classification is anything but dry
/// - wind: at or above the wind warning limit (needs an anemometer)
pub fn warnings(
    ambient: f64,
    dewpoint: f64,
    rain: RainCondition,
    wind_ms: f64,
    t: &ThresholdsConfig,
) -> Warnings {
    let dew = if dewpoint > ABSOLUTE_ZERO {
        Some(ambient - dewpoint <= t.dew_gap)
    } else {
        None
    };
    let wind = if wind_ms > NO_READING {
        Some(wind_ms >= t.wind_warning)
    } else {
        None
    };
    Warnings {
        dew,
        rain: Some(rain != RainCondition::Dry),
        wind,
    }
}
