// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! One polling cycle: sample, convert, classify, drive the heater, poll
//! the switch, publish the report.

use std::sync::atomic::AtomicBool;
use std::time::Instant;

use anyhow::Result;
use log::{debug, error};

use crate::classification::{
    classify_cloud, classify_humidity, classify_rain, classify_sky_darkness, classify_wind,
    warnings,
};
use crate::config::Config;
use crate::conversion::{
    ambient_temperature, corrected_sky_temperature, dewpoint, rain_sensor_temperature,
    sky_brightness, supply_voltage, DeviceConstants,
};
use crate::heater::{HeaterController, HeaterInputs};
use crate::protocol::{CloudWatcher, NO_READING};
use crate::sampling::{acquire_cycle, CycleOutcome};
use crate::WeatherReport;

/// What one cycle produced.
pub(super) enum CycleResult {
    Report(Box<WeatherReport>),
    Cancelled,
}

/// Run one full cycle against the device. A failure anywhere discards
/// the cycle; the caller logs it and waits for the next tick.
pub(super) fn run_cycle(
    device: &CloudWatcher,
    constants: &DeviceConstants,
    config: &Config,
    heater: &mut HeaterController,
    has_anemometer: bool,
    cancel: &AtomicBool,
) -> Result<CycleResult> {
    let sample = match acquire_cycle(
        device,
        cancel,
        config.connection.anemometer,
        has_anemometer,
    )? {
        CycleOutcome::Complete(sample) => sample,
        CycleOutcome::Cancelled => return Ok(CycleResult::Cancelled),
    };
    debug!("acquisition cycle took {:?}", sample.duration);

    let ambient = ambient_temperature(&sample, constants);
    let rain_sensor_temp = rain_sensor_temperature(sample.rain_sensor_temp_raw, constants);
    let supply = supply_voltage(sample.zener_raw, constants);
    let brightness = sky_brightness(sample.ldr_raw, constants);
    let sky = sample.sky_ir / 100.0;
    let ir_sensor = sample.sensor_ir / 100.0;
    let corrected_sky = corrected_sky_temperature(sky, ir_sensor, &config.sky_correction);
    let (dew_point, humidity) = dewpoint(ambient, sample.humidity);

    let rain = classify_rain(sample.rain_frequency, &config.thresholds);
    let cloud = classify_cloud(corrected_sky, &config.thresholds);
    let wind = classify_wind(sample.wind_ms, &config.thresholds);
    let darkness = classify_sky_darkness(brightness, &config.thresholds);
    let humidity_condition = classify_humidity(sample.humidity, &config.thresholds);
    let flags = warnings(ambient, dew_point, rain, sample.wind_ms, &config.thresholds);

    let pwm = heater.step(
        &config.heater,
        &HeaterInputs {
            ambient,
            rain_sensor_temp,
            rain,
            now: Instant::now(),
            refresh: config.connection.refresh,
        },
    );
    // A failed PWM write is logged, not retried; the correction loop
    // resumes on the next cycle.
    if let Err(e) = device.set_heater_pwm(pwm) {
        error!("heater PWM write failed: {}", e);
    }

    let switch = match device.switch_state() {
        Ok(state) => Some(state),
        Err(e) => {
            error!("switch poll failed: {}", e);
            None
        }
    };

    let report = WeatherReport {
        timestamp: chrono::Utc::now(),
        sky_temperature: corrected_sky,
        raw_sky_temperature: sky,
        ambient_temperature: ambient,
        rain_sensor_temperature: rain_sensor_temp,
        rain_frequency: sample.rain_frequency,
        supply_voltage: supply,
        sky_brightness_kohm: brightness,
        wind_speed_ms: (sample.wind_ms > NO_READING).then_some(sample.wind_ms),
        humidity: (sample.humidity > NO_READING).then_some(humidity),
        dewpoint: dew_point,
        rain,
        cloud,
        wind,
        darkness,
        humidity_condition,
        warnings: flags,
        heater_state: heater.state(),
        heater_power: heater.power(),
        switch,
        cycle_duration_secs: sample.duration.as_secs_f64(),
    };
    Ok(CycleResult::Report(Box::new(report)))
}
