// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

use anyhow::Result;
use rust_cloudwatcher::config::Config;
use rust_cloudwatcher::protocol::AnemometerType;
use std::fs;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

#[test]
fn test_missing_config_creates_default_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("cloudwatcher.yaml");

    let config = Config::from_file(&config_path)?;
    assert!(config_path.exists(), "default config file was not created");
    assert_eq!(config.connection.baud_rate, 9600);
    assert_eq!(config.connection.refresh, 15.0);
    assert_eq!(config.heater.min_power, 10.0);

    Ok(())
}

#[test]
fn test_config_round_trip() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("cloudwatcher.yaml");

    let mut config = Config::default();
    config.connection.port = "udp://10.0.0.5:10000".to_string();
    config.connection.anemometer = AnemometerType::Black;
    config.thresholds.rain_wet = 2000.0;
    config.heater.impulse_cycle = 300.0;
    config.sky_correction.k1 = 100.0;
    config.save_to_file(&config_path)?;

    let loaded = Config::from_file(&config_path)?;
    assert_eq!(loaded.connection.port, "udp://10.0.0.5:10000");
    assert!(loaded.connection.is_udp());
    assert_eq!(loaded.connection.udp_address(), Some("10.0.0.5:10000"));
    assert_eq!(loaded.connection.anemometer, AnemometerType::Black);
    assert_eq!(loaded.thresholds.rain_wet, 2000.0);
    assert_eq!(loaded.heater.impulse_cycle, 300.0);
    assert_eq!(loaded.sky_correction.k1, 100.0);

    Ok(())
}

#[test]
fn test_partial_config_uses_section_defaults() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("cloudwatcher.yaml");

    let partial_yaml = r#"
connection:
  port: /dev/ttyUSB1
  baud_rate: 9600
  refresh: 30.0
  anemometer: gray
"#;
    fs::write(&config_path, partial_yaml)?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.connection.port, "/dev/ttyUSB1");
    assert_eq!(config.connection.refresh, 30.0);
    // untouched sections keep their defaults
    assert_eq!(config.thresholds.rain_raining, 400.0);
    assert_eq!(config.heater.impulse_duration, 60.0);
    assert_eq!(config.sky_correction.k5, 100.0);

    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("cloudwatcher.yaml");

    let invalid_yaml = r#"
connection:
  port: /dev/ttyUSB0
  baud_rate: "not-a-number"
"#;
    fs::write(&config_path, invalid_yaml)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err(), "config loading should have failed");

    Ok(())
}

#[test]
fn test_cli_overrides() -> Result<()> {
    setup();
    let mut config = Config::default();
    config.apply_args(Some("udp://host:10000".to_string()), None, Some(5.0));
    assert_eq!(config.connection.port, "udp://host:10000");
    assert_eq!(config.connection.baud_rate, 9600);
    assert_eq!(config.connection.refresh, 5.0);
    Ok(())
}
