// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Sensor sampling and aggregation
//!
//! One acquisition cycle reads every channel once per pass, five passes,
//! then reduces each channel to an outlier-trimmed mean. The cycle is
//! all-or-nothing: if any read fails or the session is cancelled
//! mid-cycle, the whole cycle is discarded and nothing reaches the
//! conversion stage until the next scheduled tick.
//!
//! The humidity sensor is the exception: it is read once per cycle, not
//! aggregated, and a failed read degrades to the [`NO_READING`] sentinel
//! instead of failing the cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::protocol::{AnemometerType, CloudWatcher, ProtocolError, NO_READING};

/// Raw reads per channel per cycle.
pub const SAMPLES_PER_CYCLE: usize = 5;

/// Raw codes from one pass over all channels. Discarded after
/// aggregation.
#[derive(Debug, Clone, Copy)]
struct RawReading {
    sky_ir: i32,
    sensor_ir: i32,
    rain_frequency: i32,
    zener_raw: i32,
    ambient_raw: i32,
    ldr_raw: i32,
    rain_sensor_temp_raw: i32,
    wind_ms: f64,
}

/// Outlier-trimmed per-channel means for one cycle, plus the one-shot
/// humidity readings and the measured wall-clock duration.
#[derive(Debug, Clone, Copy)]
pub struct AggregatedSample {
    pub sky_ir: f64,
    pub sensor_ir: f64,
    pub rain_frequency: f64,
    pub zener_raw: f64,
    pub ambient_raw: f64,
    pub ldr_raw: f64,
    pub rain_sensor_temp_raw: f64,
    /// [`NO_READING`] when no anemometer is fitted.
    pub wind_ms: f64,
    /// [`NO_READING`] when unavailable or the single read failed.
    pub humidity: f64,
    /// [`NO_READING`] when unavailable or the single read failed.
    pub rh_temperature: f64,
    pub duration: Duration,
}

/// Result of one acquisition cycle.
pub enum CycleOutcome {
    Complete(AggregatedSample),
    /// Disconnect was requested while the cycle was in flight.
    Cancelled,
}

/// Mean of `values` recomputed over the subset within one population
/// standard deviation of the initial mean. The sample closest to the
/// mean always survives the filter, so the kept subset is never empty;
/// a defensive fallback to the plain mean covers the impossible case.
pub fn trimmed_mean(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| (v - mean).abs() <= stddev)
        .collect();
    if kept.is_empty() {
        warn!("aggregation filter kept no samples, falling back to plain mean");
        return mean;
    }
    kept.iter().sum::<f64>() / kept.len() as f64
}

fn check_cancel(cancel: &AtomicBool) -> bool {
    cancel.load(Ordering::SeqCst)
}

/// Run one full acquisition cycle against the device.
///
/// The cancellation flag is checked between channel reads so a
/// disconnect in progress aborts the cycle promptly without tearing the
/// link out from under an in-flight command.
pub fn acquire_cycle(
    device: &CloudWatcher,
    cancel: &AtomicBool,
    anemometer: AnemometerType,
    has_anemometer: bool,
) -> Result<CycleOutcome, ProtocolError> {
    let started = Instant::now();
    let mut passes: Vec<RawReading> = Vec::with_capacity(SAMPLES_PER_CYCLE);

    for pass in 0..SAMPLES_PER_CYCLE {
        if check_cancel(cancel) {
            return Ok(CycleOutcome::Cancelled);
        }
        let sky_ir = device.ir_sky_temperature()?;

        if check_cancel(cancel) {
            return Ok(CycleOutcome::Cancelled);
        }
        let sensor_ir = device.ir_sensor_temperature()?;

        if check_cancel(cancel) {
            return Ok(CycleOutcome::Cancelled);
        }
        let rain_frequency = device.rain_frequency()?;

        if check_cancel(cancel) {
            return Ok(CycleOutcome::Cancelled);
        }
        let values = device.values()?;

        let wind_ms = if has_anemometer {
            if check_cancel(cancel) {
                return Ok(CycleOutcome::Cancelled);
            }
            device.wind_speed(anemometer)?.unwrap_or(NO_READING)
        } else {
            NO_READING
        };

        passes.push(RawReading {
            sky_ir,
            sensor_ir,
            rain_frequency,
            zener_raw: values.zener_raw,
            ambient_raw: values.ambient_raw,
            ldr_raw: values.ldr_raw,
            rain_sensor_temp_raw: values.rain_sensor_temp_raw,
            wind_ms,
        });
        debug!("acquisition pass {}/{} done", pass + 1, SAMPLES_PER_CYCLE);
    }

    if check_cancel(cancel) {
        return Ok(CycleOutcome::Cancelled);
    }

    // Humidity degrades to the sentinel instead of failing the cycle.
    let humidity = match device.humidity() {
        Ok(Some(rh)) => rh,
        Ok(None) => NO_READING,
        Err(e) => {
            debug!("humidity read failed: {}", e);
            NO_READING
        }
    };
    let rh_temperature = match device.rh_temperature() {
        Ok(Some(t)) => t,
        Ok(None) => NO_READING,
        Err(e) => {
            debug!("RH temperature read failed: {}", e);
            NO_READING
        }
    };

    let channel = |f: &dyn Fn(&RawReading) -> f64| -> f64 {
        let values: Vec<f64> = passes.iter().map(f).collect();
        trimmed_mean(&values)
    };

    let wind_ms = if has_anemometer {
        channel(&|r| r.wind_ms)
    } else {
        NO_READING
    };

    let sample = AggregatedSample {
        sky_ir: channel(&|r| r.sky_ir as f64),
        sensor_ir: channel(&|r| r.sensor_ir as f64),
        rain_frequency: channel(&|r| r.rain_frequency as f64),
        zener_raw: channel(&|r| r.zener_raw as f64),
        ambient_raw: channel(&|r| r.ambient_raw as f64),
        ldr_raw: channel(&|r| r.ldr_raw as f64),
        rain_sensor_temp_raw: channel(&|r| r.rain_sensor_temp_raw as f64),
        wind_ms,
        humidity,
        rh_temperature,
        duration: started.elapsed(),
    };
    Ok(CycleOutcome::Complete(sample))
}
