// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Closed-loop rain-sensor heater control
//!
//! The heater keeps the rain sensor a few degrees above ambient so dew
//! does not read as rain, and pulses it hot to dry the sensor after real
//! rain. Three states:
//!
//! - `Normal`: track the desired temperature curve with proportional
//!   correction.
//! - `Increasing`: the sensor stayed wet for a full impulse cycle; run
//!   the heater at 100% until the sensor reaches ambient plus the
//!   impulse offset.
//! - `Pulse`: hold the target for the impulse duration, then drop back
//!   to `Normal`.
//!
//! The controller is stepped exactly once per scheduler cycle, all
//! transitions are synchronous within that step, and the computed power
//! is always clamped to `[min_power, 100]` before PWM encoding.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::classification::RainCondition;
use crate::config::HeaterConfig;

/// Proportional correction: temperature error selects a multiplier.
/// Ordered by descending error; the first matching row wins.
const CORRECTION_TABLE: &[(f64, f64)] = &[
    (8.0, 1.4),
    (4.0, 1.2),
    (3.0, 1.1),
    (2.0, 1.06),
    (1.0, 1.04),
    (0.5, 1.02),
    (0.3, 1.01),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaterState {
    Normal,
    Increasing,
    Pulse,
}

/// Per-cycle inputs to the transition function.
#[derive(Debug, Clone, Copy)]
pub struct HeaterInputs {
    pub ambient: f64,
    pub rain_sensor_temp: f64,
    pub rain: RainCondition,
    pub now: Instant,
    /// Scheduler refresh interval in seconds; normalizes the correction
    /// strength to the polling cadence.
    pub refresh: f64,
}

/// Heater controller state. Persists across cycles, mutated only by
/// [`HeaterController::step`], reset to `Normal` on connect.
pub struct HeaterController {
    state: HeaterState,
    wet_since: Option<Instant>,
    pulse_started: Option<Instant>,
    /// Current heater power in percent, kept within `[min_power, 100]`.
    power: f64,
}

impl HeaterController {
    pub fn new(settings: &HeaterConfig) -> Self {
        HeaterController {
            state: HeaterState::Normal,
            wet_since: None,
            pulse_started: None,
            power: settings.min_power,
        }
    }

    pub fn state(&self) -> HeaterState {
        self.state
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    /// PWM code for the current power, in `[0, 1023]`.
    pub fn pwm_code(&self) -> u16 {
        ((self.power / 100.0) * 1023.0).round() as u16
    }

    /// Evaluate one controller cycle: advance the state machine, update
    /// the power, and return the PWM code to write.
    pub fn step(&mut self, settings: &HeaterConfig, inputs: &HeaterInputs) -> u16 {
        // Wetness timer: resets whenever the sensor reads dry.
        if inputs.rain == RainCondition::Dry {
            self.wet_since = None;
        } else if self.wet_since.is_none() {
            self.wet_since = Some(inputs.now);
        }

        self.state = match self.state {
            HeaterState::Normal => {
                let wet_for = self
                    .wet_since
                    .map(|t0| inputs.now.duration_since(t0))
                    .unwrap_or(Duration::ZERO);
                if wet_for >= Duration::from_secs_f64(settings.impulse_cycle) {
                    HeaterState::Increasing
                } else {
                    HeaterState::Normal
                }
            }
            HeaterState::Increasing => {
                let desired = inputs.ambient + settings.impulse_temp;
                if inputs.rain_sensor_temp >= desired {
                    self.pulse_started = Some(inputs.now);
                    HeaterState::Pulse
                } else {
                    HeaterState::Increasing
                }
            }
            HeaterState::Pulse => {
                let elapsed = self
                    .pulse_started
                    .map(|t0| inputs.now.duration_since(t0))
                    .unwrap_or(Duration::ZERO);
                if elapsed >= Duration::from_secs_f64(settings.impulse_duration) {
                    self.pulse_started = None;
                    // A still-wet sensor must stay wet for a fresh full
                    // cycle before the next impulse.
                    self.wet_since = self.wet_since.and(Some(inputs.now));
                    HeaterState::Normal
                } else {
                    HeaterState::Pulse
                }
            }
        };

        match self.state {
            HeaterState::Increasing => {
                self.power = 100.0;
            }
            HeaterState::Normal | HeaterState::Pulse => {
                let desired = desired_temperature(settings, inputs.ambient);
                let diff = (desired - inputs.rain_sensor_temp).abs();
                let multiplier = 1.0 + (correction_multiplier(diff) - 1.0)
                    * (inputs.refresh / 10.0).sqrt();
                if inputs.rain_sensor_temp > desired {
                    self.power /= multiplier;
                } else {
                    self.power *= multiplier;
                }
            }
        }

        self.power = self.power.clamp(settings.min_power, 100.0);
        self.pwm_code()
    }
}

/// Desired rain-sensor temperature as a three-segment function of
/// ambient: flat `delta_low` below `temp_low`, `ambient + delta_high`
/// above `temp_high`, linear in between, never below `delta_low`.
fn desired_temperature(settings: &HeaterConfig, ambient: f64) -> f64 {
    if ambient < settings.temp_low {
        settings.delta_low
    } else if ambient > settings.temp_high {
        ambient + settings.delta_high
    } else {
        let high_end = settings.temp_high + settings.delta_high;
        let span = settings.temp_high - settings.temp_low;
        let desired =
            settings.delta_low + (high_end - settings.delta_low) * (ambient - settings.temp_low) / span;
        desired.max(settings.delta_low)
    }
}

fn correction_multiplier(diff: f64) -> f64 {
    CORRECTION_TABLE
        .iter()
        .find(|(threshold, _)| diff > *threshold)
        .map(|(_, m)| *m)
        .unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> HeaterConfig {
        HeaterConfig::default()
    }

    fn inputs(rain: RainCondition, sensor: f64, now: Instant) -> HeaterInputs {
        HeaterInputs {
            ambient: 10.0,
            rain_sensor_temp: sensor,
            rain,
            now,
            refresh: 10.0,
        }
    }

    #[test]
    fn stays_normal_while_dry() {
        let s = settings();
        let mut heater = HeaterController::new(&s);
        let t0 = Instant::now();
        heater.step(&s, &inputs(RainCondition::Dry, 14.0, t0));
        heater.step(
            &s,
            &inputs(
                RainCondition::Dry,
                14.0,
                t0 + Duration::from_secs_f64(s.impulse_cycle * 2.0),
            ),
        );
        assert_eq!(heater.state(), HeaterState::Normal);
    }

    #[test]
    fn full_impulse_sequence() {
        let s = settings();
        let mut heater = HeaterController::new(&s);
        let t0 = Instant::now();

        // Wet, but not yet long enough.
        heater.step(&s, &inputs(RainCondition::Wet, 14.0, t0));
        assert_eq!(heater.state(), HeaterState::Normal);

        // Continuously wet for a full impulse cycle.
        let t1 = t0 + Duration::from_secs_f64(s.impulse_cycle);
        heater.step(&s, &inputs(RainCondition::Wet, 14.0, t1));
        assert_eq!(heater.state(), HeaterState::Increasing);
        assert_eq!(heater.power(), 100.0);

        // Sensor reaches ambient + impulse offset: pulse begins.
        let t2 = t1 + Duration::from_secs(30);
        heater.step(
            &s,
            &inputs(RainCondition::Wet, 10.0 + s.impulse_temp, t2),
        );
        assert_eq!(heater.state(), HeaterState::Pulse);

        // Pulse holds until the impulse duration elapses.
        let t3 = t2 + Duration::from_secs_f64(s.impulse_duration / 2.0);
        heater.step(&s, &inputs(RainCondition::Wet, 21.0, t3));
        assert_eq!(heater.state(), HeaterState::Pulse);

        let t4 = t2 + Duration::from_secs_f64(s.impulse_duration);
        heater.step(&s, &inputs(RainCondition::Wet, 21.0, t4));
        assert_eq!(heater.state(), HeaterState::Normal);
    }

    #[test]
    fn dry_reading_resets_wetness_timer() {
        let s = settings();
        let mut heater = HeaterController::new(&s);
        let t0 = Instant::now();
        heater.step(&s, &inputs(RainCondition::Wet, 14.0, t0));
        // A dry cycle halfway through resets the timer.
        let t1 = t0 + Duration::from_secs_f64(s.impulse_cycle / 2.0);
        heater.step(&s, &inputs(RainCondition::Dry, 14.0, t1));
        let t2 = t0 + Duration::from_secs_f64(s.impulse_cycle + 1.0);
        heater.step(&s, &inputs(RainCondition::Wet, 14.0, t2));
        assert_eq!(heater.state(), HeaterState::Normal);
    }

    #[test]
    fn power_stays_clamped_and_pwm_in_range() {
        let s = settings();
        let mut heater = HeaterController::new(&s);
        let t0 = Instant::now();
        // Sensor far too cold: power multiplies up every cycle.
        for i in 0..200 {
            let code = heater.step(
                &s,
                &inputs(
                    RainCondition::Dry,
                    -20.0,
                    t0 + Duration::from_secs(i * 15),
                ),
            );
            assert!(heater.power() >= s.min_power && heater.power() <= 100.0);
            assert!(code <= 1023);
        }
        assert_eq!(heater.power(), 100.0);
        assert_eq!(heater.pwm_code(), 1023);

        // Sensor far too hot: power divides down to the floor.
        for i in 0..200 {
            heater.step(
                &s,
                &inputs(
                    RainCondition::Dry,
                    60.0,
                    t0 + Duration::from_secs(3000 + i * 15),
                ),
            );
        }
        assert_eq!(heater.power(), s.min_power);
    }

    #[test]
    fn desired_temperature_three_segments() {
        let s = HeaterConfig {
            temp_low: 0.0,
            temp_high: 20.0,
            delta_low: 6.0,
            delta_high: 4.0,
            ..HeaterConfig::default()
        };
        // Below temp_low: flat delta_low.
        assert_eq!(desired_temperature(&s, -10.0), 6.0);
        // Above temp_high: ambient + delta_high.
        assert_eq!(desired_temperature(&s, 30.0), 34.0);
        // Endpoints of the linear segment.
        assert_eq!(desired_temperature(&s, 0.0), 6.0);
        assert_eq!(desired_temperature(&s, 20.0), 24.0);
        // Midpoint interpolates.
        assert_eq!(desired_temperature(&s, 10.0), 15.0);
    }

    #[test]
    fn correction_table_is_ordered() {
        assert_eq!(correction_multiplier(10.0), 1.4);
        assert_eq!(correction_multiplier(5.0), 1.2);
        assert_eq!(correction_multiplier(0.4), 1.01);
        assert_eq!(correction_multiplier(0.1), 1.0);
    }
}
