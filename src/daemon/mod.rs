// Copyright (c) 2025 Rust CloudWatcher contributors
// This file is part of the rust-cloudwatcher project and is licensed under the
// MIT license (see LICENSE.md for details).

//! Polling daemon
//!
//! A single blocking task owns the device session and runs one full
//! cycle (sample → convert → classify → heater → switch poll) per
//! refresh interval. The next cycle is scheduled after
//! `max(1, refresh − cycle_duration)` seconds so slow cycles do not
//! accumulate drift.
//!
//! Shutdown is cooperative: the running flag is cleared, the in-flight
//! cycle notices it between channel reads and aborts, and `shutdown`
//! awaits the task before the link is dropped. The last computed heater
//! power is re-applied as a parting safety write.

mod cycle;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, error, info};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::conversion::DeviceConstants;
use crate::heater::HeaterController;
use crate::protocol::CloudWatcher;
use crate::WeatherReport;

use cycle::{run_cycle, CycleResult};

/// Sleep slice used inside the reschedule wait so shutdown stays
/// responsive between cycles.
const WAIT_SLICE: Duration = Duration::from_millis(250);

/// Represents the daemon task set that can be started and managed.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<WeatherReport>>>,
}

impl Daemon {
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Most recent completed report, if any cycle has finished yet.
    pub fn latest_report(&self) -> Option<WeatherReport> {
        self.latest.lock().unwrap().clone()
    }

    /// Start the polling task. Takes ownership of the connected session;
    /// the heater controller starts in `Normal` as connect semantics
    /// require.
    pub fn launch(
        &mut self,
        device: CloudWatcher,
        constants: DeviceConstants,
        config: Config,
        has_anemometer: bool,
        output: Option<PathBuf>,
    ) {
        info!(
            "starting polling task, refresh interval {} s",
            config.connection.refresh
        );
        let running = self.running.clone();
        let latest = self.latest.clone();
        let task = tokio::task::spawn_blocking(move || {
            poll_loop(device, constants, config, has_anemometer, output, running, latest)
        });
        self.tasks.push(task);
    }

    /// Request cancellation and block until the in-flight cycle finishes
    /// or aborts. Must complete before the link is released so no
    /// command can race a closing handle.
    pub async fn shutdown(self) -> Result<()> {
        info!("stopping daemon");
        self.running.store(false, Ordering::SeqCst);
        for task in self.tasks {
            task.await??;
        }
        Ok(())
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

fn poll_loop(
    device: CloudWatcher,
    constants: DeviceConstants,
    config: Config,
    has_anemometer: bool,
    output: Option<PathBuf>,
    running: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<WeatherReport>>>,
) -> Result<()> {
    let mut heater = HeaterController::new(&config.heater);

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        match run_cycle(
            &device,
            &constants,
            &config,
            &mut heater,
            has_anemometer,
            &running,
        ) {
            Ok(CycleResult::Report(report)) => {
                info!(
                    "sky {:.2} °C ({:?}), ambient {:.2} °C, rain {:?} ({:.0} Hz), heater {:?} {:.0}%",
                    report.sky_temperature,
                    report.cloud,
                    report.ambient_temperature,
                    report.rain,
                    report.rain_frequency,
                    report.heater_state,
                    report.heater_power,
                );
                if let Some(path) = &output {
                    if let Err(e) = write_snapshot(path, &report) {
                        error!("failed to write report snapshot: {:#}", e);
                    }
                }
                *latest.lock().unwrap() = Some(*report);
            }
            Ok(CycleResult::Cancelled) => {
                debug!("cycle cancelled, shutting down");
                break;
            }
            // No retry here: the failed cycle is discarded whole and the
            // next scheduled tick self-heals.
            Err(e) => error!("polling cycle failed, skipping this tick: {:#}", e),
        }

        let elapsed = started.elapsed().as_secs_f64();
        let wait = (config.connection.refresh - elapsed).max(1.0);
        debug!("cycle took {:.2} s, next in {:.2} s", elapsed, wait);
        let deadline = Instant::now() + Duration::from_secs_f64(wait);
        while running.load(Ordering::SeqCst) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(WAIT_SLICE.min(remaining));
        }
    }

    // Parting safety write before the link is dropped.
    let code = heater.pwm_code();
    if let Err(e) = device.set_heater_pwm(code) {
        error!("final heater PWM write failed: {}", e);
    } else {
        info!("heater left at {:.0}% power", heater.power());
    }
    Ok(())
}

fn write_snapshot(path: &PathBuf, report: &WeatherReport) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}
