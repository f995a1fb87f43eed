// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Typed sensor queries on top of the framed transport
//!
//! Each query sends a 1–2 character command code and parses the response
//! against a fixed field pattern. Parsing is atomic: a query either
//! returns a fully populated value or an error, never partial output.
//!
//! Several queries are gated by firmware version and short-circuit with a
//! safe default without touching the wire:
//! - relative humidity sensor: firmware >= 5.6
//! - anemometer / wind speed:  firmware >= 5.0
//! - electrical constants:     firmware >= 3.0
//!
//! The `C!` voltages query has two response shapes: firmware >= 3.0 omits
//! the ambient-thermistor field.

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::{Transport, TransportError};

/// Marker for an unavailable or failed reading.
pub const NO_READING: f64 = -100000.0;

/// Raw ambient code reported when no ambient thermistor is fitted.
/// Anything below -200 means "sensor absent".
pub const NO_AMBIENT_SENSOR: i32 = -10000;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response shape did not match the expected field pattern.
    #[error("malformed {command} response: {response:?}")]
    Parse {
        command: &'static str,
        response: String,
    },

    #[error("device did not identify as a CloudWatcher: {0:?}")]
    NotCloudWatcher(String),
}

/// Anemometer hardware variant. The black model reads low and gets a
/// linear correction before unit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnemometerType {
    Gray,
    Black,
}

impl Default for AnemometerType {
    fn default() -> Self {
        AnemometerType::Gray
    }
}

/// Rain-sensor heater switch position, as reported by `F!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchState {
    Open,
    Closed,
}

/// Identity read during the connect handshake.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub model: String,
    pub firmware: String,
    pub serial_number: String,
}

/// Raw codes from the `C!` voltages query.
#[derive(Debug, Clone, Copy)]
pub struct PowerValues {
    pub zener_raw: i32,
    /// [`NO_AMBIENT_SENSOR`] on firmware >= 3.0 (field not reported).
    pub ambient_raw: i32,
    pub ldr_raw: i32,
    pub rain_sensor_temp_raw: i32,
}

/// Calibration constants read once from the device via `M!`.
#[derive(Debug, Clone, Copy)]
pub struct ElectricalConstants {
    pub zener_voltage: f64,
    pub ldr_max_resistance: f64,
    pub ldr_pullup_resistance: f64,
    pub rain_beta: f64,
    pub rain_res_at_25: f64,
    pub rain_pullup_resistance: f64,
}

/// One connected CloudWatcher session. Owns the transport; the firmware
/// version read at handshake drives feature gating.
pub struct CloudWatcher {
    transport: Transport,
    firmware: f64,
}

/// Split a stripped response into `(tag, value)` fields.
/// `"!6 940!4 56!5 800"` yields `[("6","940"), ("4","56"), ("5","800")]`.
fn split_fields(response: &str) -> Vec<(&str, &str)> {
    response
        .split('!')
        .filter(|s| !s.is_empty())
        .map(|segment| match segment.split_once(char::is_whitespace) {
            Some((tag, value)) => (tag, value.trim()),
            None => (segment.trim(), ""),
        })
        .collect()
}

fn parse_err(command: &'static str, response: &[u8]) -> ProtocolError {
    ProtocolError::Parse {
        command,
        response: String::from_utf8_lossy(response).into_owned(),
    }
}

/// Decode an integer field, requiring the expected tag.
fn int_field(
    fields: &[(&str, &str)],
    index: usize,
    tag: &str,
    command: &'static str,
    raw: &[u8],
) -> Result<i32, ProtocolError> {
    let &(t, v) = fields
        .get(index)
        .ok_or_else(|| parse_err(command, raw))?;
    if t != tag {
        return Err(parse_err(command, raw));
    }
    v.parse::<i32>().map_err(|_| parse_err(command, raw))
}

impl CloudWatcher {
    /// Run the connect handshake on an open transport: reset the device
    /// buffers, verify the identity block, and read firmware and serial
    /// number. Fails if the peer is not a CloudWatcher.
    pub fn handshake(transport: Transport) -> Result<(Self, DeviceInfo), ProtocolError> {
        let mut device = CloudWatcher {
            transport,
            firmware: 0.0,
        };
        device.reset_buffers()?;
        let model = device.identify()?;
        let firmware = device.read_firmware_version()?;
        let serial_number = device.serial_number()?;
        let info = DeviceInfo {
            model,
            firmware,
            serial_number,
        };
        debug!(
            "handshake complete: model={} firmware={} serial={}",
            info.model, info.firmware, info.serial_number
        );
        Ok((device, info))
    }

    /// Firmware version as parsed at handshake.
    pub fn firmware(&self) -> f64 {
        self.firmware
    }

    fn ascii_command(
        &self,
        command: &'static str,
        block_count: usize,
    ) -> Result<(Vec<u8>, String), ProtocolError> {
        let raw = self
            .transport
            .command(command, block_count, Duration::ZERO)?;
        let text = std::str::from_utf8(&raw)
            .map_err(|_| parse_err(command, &raw))?
            .to_owned();
        Ok((raw, text))
    }

    /// `z!` — flush the device-side buffers. No response.
    pub fn reset_buffers(&self) -> Result<(), ProtocolError> {
        self.transport.command_no_reply("z!")?;
        Ok(())
    }

    /// `A!` — identity check. The first block must read `!N CloudWatcher`;
    /// the model name is returned.
    pub fn identify(&self) -> Result<String, ProtocolError> {
        let (raw, text) = self.ascii_command("A!", 2)?;
        if !text.starts_with("!N CloudWatcher") {
            return Err(ProtocolError::NotCloudWatcher(
                String::from_utf8_lossy(&raw).into_owned(),
            ));
        }
        let fields = split_fields(&text);
        match fields.first() {
            Some(&("N", model)) => Ok(model.to_string()),
            _ => Err(parse_err("A!", &raw)),
        }
    }

    /// `B!` — firmware version (`!V x.xx`). Stores the parsed version for
    /// feature gating and returns the version string.
    pub fn read_firmware_version(&mut self) -> Result<String, ProtocolError> {
        let (raw, text) = self.ascii_command("B!", 2)?;
        let fields = split_fields(&text);
        match fields.first() {
            Some(&("V", version)) if !version.is_empty() => {
                self.firmware = version.parse::<f64>().map_err(|_| parse_err("B!", &raw))?;
                Ok(version.to_string())
            }
            _ => Err(parse_err("B!", &raw)),
        }
    }

    /// `K!` — device serial number (`!K <digits>`).
    pub fn serial_number(&self) -> Result<String, ProtocolError> {
        let (raw, text) = self.ascii_command("K!", 2)?;
        let fields = split_fields(&text);
        match fields.first() {
            Some(&("K", serial)) if !serial.is_empty() => Ok(serial.to_string()),
            _ => Err(parse_err("K!", &raw)),
        }
    }

    /// `S!` — raw IR sky temperature (`!1 <int>`, hundredths of °C).
    pub fn ir_sky_temperature(&self) -> Result<i32, ProtocolError> {
        let (raw, text) = self.ascii_command("S!", 2)?;
        int_field(&split_fields(&text), 0, "1", "S!", &raw)
    }

    /// `T!` — raw IR sensor temperature (`!2 <int>`, hundredths of °C).
    pub fn ir_sensor_temperature(&self) -> Result<i32, ProtocolError> {
        let (raw, text) = self.ascii_command("T!", 2)?;
        int_field(&split_fields(&text), 0, "2", "T!", &raw)
    }

    /// `E!` — rain sensor frequency (`!R <int>`).
    pub fn rain_frequency(&self) -> Result<i32, ProtocolError> {
        let (raw, text) = self.ascii_command("E!", 2)?;
        int_field(&split_fields(&text), 0, "R", "E!", &raw)
    }

    /// `C!` — supply voltage, LDR and rain-sensor temperature codes.
    /// Firmware >= 3.0 reports three fields, older firmware four (the
    /// extra one is the ambient thermistor).
    pub fn values(&self) -> Result<PowerValues, ProtocolError> {
        if self.firmware >= 3.0 {
            let (raw, text) = self.ascii_command("C!", 4)?;
            let fields = split_fields(&text);
            Ok(PowerValues {
                zener_raw: int_field(&fields, 0, "6", "C!", &raw)?,
                ambient_raw: NO_AMBIENT_SENSOR,
                ldr_raw: int_field(&fields, 1, "4", "C!", &raw)?,
                rain_sensor_temp_raw: int_field(&fields, 2, "5", "C!", &raw)?,
            })
        } else {
            let (raw, text) = self.ascii_command("C!", 5)?;
            let fields = split_fields(&text);
            Ok(PowerValues {
                zener_raw: int_field(&fields, 0, "6", "C!", &raw)?,
                ambient_raw: int_field(&fields, 1, "3", "C!", &raw)?,
                ldr_raw: int_field(&fields, 2, "4", "C!", &raw)?,
                rain_sensor_temp_raw: int_field(&fields, 3, "5", "C!", &raw)?,
            })
        }
    }

    /// `M!` — electrical calibration constants, packed as big-endian
    /// 16-bit pairs at fixed byte offsets. Returns `None` below firmware
    /// 3.0 (the query does not exist there).
    pub fn electrical_constants(&self) -> Result<Option<ElectricalConstants>, ProtocolError> {
        if self.firmware < 3.0 {
            return Ok(None);
        }
        let raw = self.transport.command("M!", 2, Duration::ZERO)?;
        if raw.len() < 14 || raw[1] != b'M' {
            return Err(parse_err("M!", &raw));
        }
        let pair = |hi: usize| 256.0 * raw[hi] as f64 + raw[hi + 1] as f64;
        Ok(Some(ElectricalConstants {
            zener_voltage: pair(2) / 100.0,
            ldr_max_resistance: pair(4) / 1.0,
            ldr_pullup_resistance: pair(6) / 10.0,
            rain_beta: pair(8) / 1.0,
            rain_res_at_25: pair(10) / 10.0,
            rain_pullup_resistance: pair(12) / 10.0,
        }))
    }

    /// `t!` — relative-humidity sensor temperature in °C. `None` when the
    /// firmware predates the RH sensor. Newer sensors answer with a
    /// high-resolution `!th` block, older ones with a coarse `!t` block.
    pub fn rh_temperature(&self) -> Result<Option<f64>, ProtocolError> {
        if self.firmware < 5.6 {
            return Ok(None);
        }
        let (raw, text) = self.ascii_command("t!", 2)?;
        let fields = split_fields(&text);
        match fields.first() {
            Some(&("th", v)) => {
                let code = v.parse::<f64>().map_err(|_| parse_err("t!", &raw))?;
                Ok(Some(code * 175.72 / 65536.0 - 46.85))
            }
            Some(&("t", v)) => {
                let code = v.parse::<f64>().map_err(|_| parse_err("t!", &raw))?;
                Ok(Some(code * 1.7572 - 46.85))
            }
            _ => Err(parse_err("t!", &raw)),
        }
    }

    /// `h!` — relative humidity in percent. `None` when the firmware
    /// predates the RH sensor. Same dual-precision scheme as `t!`.
    pub fn humidity(&self) -> Result<Option<f64>, ProtocolError> {
        if self.firmware < 5.6 {
            return Ok(None);
        }
        let (raw, text) = self.ascii_command("h!", 2)?;
        let fields = split_fields(&text);
        match fields.first() {
            Some(&("hh", v)) => {
                let code = v.parse::<f64>().map_err(|_| parse_err("h!", &raw))?;
                Ok(Some(code * 125.0 / 65536.0 - 6.0))
            }
            Some(&("h", v)) => {
                let code = v.parse::<f64>().map_err(|_| parse_err("h!", &raw))?;
                Ok(Some(code * 1.7572 / 100.0 - 6.0))
            }
            _ => Err(parse_err("h!", &raw)),
        }
    }

    /// `v!` — whether an anemometer is fitted (`!v <0|1>`). `false` below
    /// firmware 5.0 without touching the wire.
    pub fn anemometer_present(&self) -> Result<bool, ProtocolError> {
        if self.firmware < 5.0 {
            return Ok(false);
        }
        let (raw, text) = self.ascii_command("v!", 2)?;
        let flag = int_field(&split_fields(&text), 0, "v", "v!", &raw)?;
        Ok(flag != 0)
    }

    /// `V!` — wind speed in m/s. The device reports km/h; the black
    /// anemometer variant additionally reads low and gets `v*0.84 + 3`
    /// applied first (only for nonzero readings). `None` below firmware
    /// 5.0.
    pub fn wind_speed(&self, anemometer: AnemometerType) -> Result<Option<f64>, ProtocolError> {
        if self.firmware < 5.0 {
            return Ok(None);
        }
        let (raw, text) = self.ascii_command("V!", 2)?;
        let fields = split_fields(&text);
        let mut kmh = match fields.first() {
            Some(&("w", v)) => v.parse::<f64>().map_err(|_| parse_err("V!", &raw))?,
            _ => return Err(parse_err("V!", &raw)),
        };
        if anemometer == AnemometerType::Black && kmh != 0.0 {
            kmh = kmh * 0.84 + 3.0;
        }
        Ok(Some(kmh * 1000.0 / 3600.0))
    }

    /// `Q!` — current heater PWM code (`!Q <int>`, 0-1023).
    pub fn heater_pwm(&self) -> Result<i32, ProtocolError> {
        let (raw, text) = self.ascii_command("Q!", 2)?;
        int_field(&split_fields(&text), 0, "Q", "Q!", &raw)
    }

    /// `Pxxxx!` — set the heater PWM code (0-1023). The device echoes the
    /// accepted value back as `!Q <int>`.
    pub fn set_heater_pwm(&self, code: u16) -> Result<i32, ProtocolError> {
        let code = code.min(1023);
        let command = format!("P{:04}!", code);
        let raw = self.transport.command(&command, 2, Duration::ZERO)?;
        let text = std::str::from_utf8(&raw)
            .map_err(|_| parse_err("P!", &raw))?
            .to_owned();
        int_field(&split_fields(&text), 0, "Q", "P!", &raw)
    }

    /// `G!` — open the heater relay switch.
    pub fn open_switch(&self) -> Result<SwitchState, ProtocolError> {
        let (raw, text) = self.ascii_command("G!", 2)?;
        Self::decode_switch("G!", &raw, &text)
    }

    /// `H!` — close the heater relay switch.
    pub fn close_switch(&self) -> Result<SwitchState, ProtocolError> {
        let (raw, text) = self.ascii_command("H!", 2)?;
        Self::decode_switch("H!", &raw, &text)
    }

    /// `F!` — read the current switch position (`!X` open, `!Y` closed).
    pub fn switch_state(&self) -> Result<SwitchState, ProtocolError> {
        let (raw, text) = self.ascii_command("F!", 2)?;
        Self::decode_switch("F!", &raw, &text)
    }

    fn decode_switch(
        command: &'static str,
        raw: &[u8],
        text: &str,
    ) -> Result<SwitchState, ProtocolError> {
        match split_fields(text).first() {
            Some(&("X", _)) => Ok(SwitchState::Open),
            Some(&("Y", _)) => Ok(SwitchState::Closed),
            _ => Err(parse_err(command, raw)),
        }
    }
}
