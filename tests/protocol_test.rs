// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! End-to-end protocol and acquisition tests against a loopback UDP
//! fake station.

mod common;

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use rust_cloudwatcher::protocol::{AnemometerType, ProtocolError, SwitchState};
use rust_cloudwatcher::sampling::{acquire_cycle, CycleOutcome};
use rust_cloudwatcher::transport::{Link, Transport, TransportError};

use common::{block, connect, connect_to, spawn_fake_station, spawn_station};

static INIT: Once = Once::new();

fn setup() {
    INIT.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

#[test]
fn handshake_and_identity() {
    setup();
    let device = connect();
    assert!((device.firmware() - 5.95).abs() < 1e-9);
}

#[test]
fn sensor_channels_decode() {
    setup();
    let device = connect();
    assert_eq!(device.ir_sky_temperature().unwrap(), -500);
    assert_eq!(device.ir_sensor_temperature().unwrap(), 2000);
    assert_eq!(device.rain_frequency().unwrap(), 2560);

    let values = device.values().unwrap();
    assert_eq!(values.zener_raw, 940);
    assert_eq!(values.ldr_raw, 56);
    assert_eq!(values.rain_sensor_temp_raw, 800);
    // firmware >= 3.0 shape carries no ambient field
    assert!(values.ambient_raw < -200);
}

#[test]
fn electrical_constants_decode() {
    setup();
    let device = connect();
    let constants = device.electrical_constants().unwrap().expect("constants");
    assert!((constants.zener_voltage - 3.0).abs() < 1e-9);
    assert!((constants.ldr_max_resistance - 1744.0).abs() < 1e-9);
    assert!((constants.ldr_pullup_resistance - 56.0).abs() < 1e-9);
    assert!((constants.rain_beta - 3450.0).abs() < 1e-9);
    assert!((constants.rain_res_at_25 - 1.0).abs() < 1e-9);
    assert!((constants.rain_pullup_resistance - 1.0).abs() < 1e-9);
}

#[test]
fn humidity_sensor_precise_mode() {
    setup();
    let device = connect();
    let t = device.rh_temperature().unwrap().expect("rh temperature");
    assert!((t - 5.77).abs() < 0.01);
    let rh = device.humidity().unwrap().expect("humidity");
    assert!((rh - (50000.0 * 125.0 / 65536.0 - 6.0)).abs() < 1e-9);
}

#[test]
fn wind_speed_with_black_anemometer_correction() {
    setup();
    let device = connect();
    assert!(device.anemometer_present().unwrap());

    let gray = device.wind_speed(AnemometerType::Gray).unwrap().unwrap();
    assert!((gray - 10.0 * 1000.0 / 3600.0).abs() < 1e-9);

    let black = device.wind_speed(AnemometerType::Black).unwrap().unwrap();
    assert!((black - (10.0 * 0.84 + 3.0) * 1000.0 / 3600.0).abs() < 1e-9);
}

#[test]
fn heater_pwm_echo_and_switch() {
    setup();
    let device = connect();
    assert_eq!(device.set_heater_pwm(512).unwrap(), 512);
    // codes above the PWM range are clamped before hitting the wire
    assert_eq!(device.set_heater_pwm(5000).unwrap(), 1023);

    assert_eq!(device.switch_state().unwrap(), SwitchState::Open);
    assert_eq!(device.open_switch().unwrap(), SwitchState::Open);
    assert_eq!(device.close_switch().unwrap(), SwitchState::Closed);
}

#[test]
fn missing_terminator_is_a_transport_failure() {
    setup();
    let addr = spawn_fake_station();
    let link = Link::open_udp(&addr.to_string()).expect("open udp link");
    let transport = Transport::new(link);

    // the fake answers unknown commands with an unframed "junk" blob
    let err = transport
        .command("y!", 2, Duration::ZERO)
        .expect_err("short response must fail");
    assert!(matches!(err, TransportError::BadTerminator { .. }));
}

#[test]
fn single_block_response_is_too_short() {
    setup();
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind");
    let addr = socket.local_addr().expect("addr");
    thread::spawn(move || {
        let mut buf = [0u8; 64];
        if let Ok((_, peer)) = socket.recv_from(&mut buf) {
            // terminator block alone: 15 bytes, no payload
            let _ = socket.send_to(&block(b"!"), peer);
        }
    });

    let link = Link::open_udp(&addr.to_string()).expect("open udp link");
    let transport = Transport::new(link);
    let err = transport
        .command("E!", 2, Duration::ZERO)
        .expect_err("15-byte response must fail");
    assert!(matches!(err, TransportError::BadTerminator { .. }));
}

#[test]
fn cycle_is_discarded_whole_when_station_goes_silent() {
    setup();
    // three replies for the handshake plus one full pass (S, T, E, C),
    // then the station stops answering
    let device = connect_to(spawn_station(7, None));
    let cancel = AtomicBool::new(false);

    let result = acquire_cycle(&device, &cancel, AnemometerType::Gray, false);
    assert!(
        matches!(result, Err(ProtocolError::Transport(_))),
        "partial cycle must fail whole"
    );
}

#[test]
fn disconnect_request_cancels_cycle_in_flight() {
    setup();
    // the station raises the flag mid-pass, right before answering the
    // fifth command (the handshake takes three)
    let cancel = Arc::new(AtomicBool::new(false));
    let addr = spawn_station(usize::MAX, Some((5, cancel.clone())));
    let device = connect_to(addr);

    let outcome = acquire_cycle(&device, &cancel, AnemometerType::Gray, false)
        .expect("cancelled cycle is not an error");
    assert!(matches!(outcome, CycleOutcome::Cancelled));
    assert!(cancel.load(Ordering::SeqCst));
}
