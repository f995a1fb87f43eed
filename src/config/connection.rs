// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Connection settings: device endpoint and polling cadence.

use serde::{Deserialize, Serialize};

use crate::protocol::AnemometerType;

/// How to reach the station and how often to poll it.
///
/// `port` is either a serial device path (`/dev/ttyUSB0`) or a
/// `udp://host:port` URL for stations behind a serial-to-network bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Polling refresh interval in seconds.
    pub refresh: f64,
    pub anemometer: AnemometerType,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            refresh: 15.0,
            anemometer: AnemometerType::default(),
        }
    }
}

impl ConnectionConfig {
    /// Whether `port` names a UDP peer rather than a local serial port.
    pub fn is_udp(&self) -> bool {
        self.port.starts_with("udp://")
    }

    /// The `host:port` part of a `udp://` endpoint.
    pub fn udp_address(&self) -> Option<&str> {
        self.port.strip_prefix("udp://")
    }
}
