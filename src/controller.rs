//! The control loop: the single owner of the gate.
//!
//! Each 100 ms tick drains the schedule mailbox and one token from every
//! command source, ticks the driver, then publishes a status snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use log::{info, warn};

use crate::command::{Command, CommandSource};
use crate::driver::{GateDriver, GateIo};
use crate::gate::{CLOSED_POSITION, OPEN_POSITION};
use crate::mailbox::GateCmd;
use crate::schedule::ScheduleHandle;
use crate::status::{self, StatusSink};
use crate::timer::Ticker;

pub const TICK_PERIOD: Duration = Duration::from_millis(100);
/// Beyond this backlog the loop resynchronises instead of replaying ticks.
const MAX_CATCH_UP_TICKS: u32 = 50;

pub struct Controller<I> {
    driver: GateDriver<I>,
    schedule: ScheduleHandle,
    schedule_enabled: bool,
    sources: Vec<Box<dyn CommandSource>>,
    sinks: Vec<Box<dyn StatusSink>>,
}

impl<I: GateIo> Controller<I> {
    pub fn new(driver: GateDriver<I>, schedule: ScheduleHandle, schedule_enabled: bool) -> Self {
        Controller {
            driver,
            schedule,
            schedule_enabled,
            sources: Vec::new(),
            sinks: Vec::new(),
        }
    }

    pub fn add_source(&mut self, source: Box<dyn CommandSource>) {
        self.sources.push(source);
    }

    pub fn add_sink(&mut self, sink: Box<dyn StatusSink>) {
        self.sinks.push(sink);
    }

    pub fn driver(&self) -> &GateDriver<I> {
        &self.driver
    }

    pub fn schedule_enabled(&self) -> bool {
        self.schedule_enabled
    }

    pub fn tick(&mut self) {
        // Drained even while disabled so a stale job cannot fire on re-enable.
        let sched_cmd = self.schedule.get_gate_cmd();
        if self.schedule_enabled {
            match sched_cmd {
                GateCmd::Open => {
                    info!("sched cmd to open gate");
                    self.driver.open();
                }
                GateCmd::Close => {
                    info!("sched cmd to close gate");
                    self.driver.close();
                }
                GateCmd::Stop | GateCmd::None => {}
            }
        } else if sched_cmd != GateCmd::None {
            info!("schedule disabled, dropping {}", sched_cmd);
        }

        let tokens: Vec<String> = self
            .sources
            .iter_mut()
            .filter_map(|source| source.poll())
            .collect();
        for token in tokens {
            self.apply(&token);
        }

        self.driver.tick();
        self.publish();
    }

    /// Parse and execute one raw command token. Malformed tokens are logged
    /// and dropped.
    pub fn apply(&mut self, token: &str) {
        match token.parse::<Command>() {
            Ok(cmd) => self.execute(cmd),
            Err(err) => warn!("ignoring command {:?}: {}", token, err),
        }
    }

    pub fn execute(&mut self, cmd: Command) {
        match cmd {
            Command::Open => {
                info!("cmd to open gate");
                self.driver.open();
            }
            Command::Close => {
                info!("cmd to close gate");
                self.driver.close();
            }
            Command::Stop => {
                info!("cmd to stop gate");
                self.driver.stop();
            }
            Command::Reset(position) => {
                let position = match position {
                    Some(position) => f64::from(position),
                    None if self.driver.is_switch_pressed() => CLOSED_POSITION,
                    None => OPEN_POSITION,
                };
                info!("cmd to reset gate position to {}", position);
                self.driver.reset_position_to(position);
            }
            Command::ClearErrors => {
                info!("cmd to clear errors");
                self.driver.gate_mut().clear_errors();
            }
            Command::ClearDiagnostics => {
                info!("cmd to clear diagnostics");
                self.driver.gate_mut().clear_diagnostics();
            }
            Command::EnableSchedule => {
                info!("cmd to enable schedule");
                self.schedule_enabled = true;
            }
            Command::DisableSchedule => {
                info!("cmd to disable schedule");
                self.schedule_enabled = false;
            }
        }
    }

    fn publish(&mut self) {
        if self.sinks.is_empty() {
            return;
        }
        let info = self.schedule.schedule_info();
        let snapshot = status::snapshot(
            &self.driver.gate().status(),
            info.as_ref(),
            self.schedule_enabled,
            Local::now(),
        );
        for sink in self.sinks.iter_mut() {
            sink.publish(&snapshot);
        }
    }

    /// Tick at a fixed cadence until `term` is set.
    pub fn run(&mut self, term: &AtomicBool) {
        let mut ticker = Ticker::new(TICK_PERIOD, Instant::now());
        while !term.load(Ordering::Relaxed) {
            let now = Instant::now();
            let mut owed = ticker.owed(now);
            if owed > MAX_CATCH_UP_TICKS {
                warn!("control loop fell {} ticks behind, resyncing", owed);
                ticker.resync(now);
                owed = 1;
            }
            for _ in 0..owed {
                self.tick();
            }
            thread::sleep(ticker.until_next(Instant::now()));
        }
    }

    /// Turn the relays off and release the hardware.
    pub fn shutdown(&mut self) {
        info!("shutting down gate driver");
        self.driver.cleanup();
    }
}
