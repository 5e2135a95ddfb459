//! Status snapshots and the sinks they are published to.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Local, SecondsFormat};
use json::{object, JsonValue};
use log::{info, warn};

use crate::gate::GateStatus;
use crate::schedule::ScheduleInfo;

const UNKNOWN: &str = "Unknown";
const NEXT_UPDATE: &str = "00:00 (midnight)";

pub fn snapshot(
    gate: &GateStatus,
    schedule: Option<&ScheduleInfo>,
    schedule_enabled: bool,
    now: DateTime<Local>,
) -> JsonValue {
    object! {
        position: gate.position,
        target_position: gate.target_position,
        is_opening: gate.is_opening,
        is_closing: gate.is_closing,
        is_moving: gate.is_moving,
        open_disabled: gate.open_disabled,
        closed_switch_pressed: gate.closed_switch_pressed,
        open_switch_pressed: gate.open_switch_pressed,
        errors: gate.errors.clone(),
        diagnostic_messages: gate.diagnostic_messages.clone(),
        schedule: schedule_json(schedule),
        last_updated: now.to_rfc3339_opts(SecondsFormat::Millis, false),
        schedule_enabled: schedule_enabled,
    }
}

fn schedule_json(schedule: Option<&ScheduleInfo>) -> JsonValue {
    match schedule {
        Some(info) => object! {
            dawn: info.dawn.to_rfc3339(),
            dusk: info.dusk.to_rfc3339(),
            sunrise: info.sunrise.to_rfc3339(),
            sunset: info.sunset.to_rfc3339(),
            gate_open_time: info.gate_open_time.format("%H:%M").to_string(),
            gate_close_time: info.gate_close_time.format("%H:%M").to_string(),
            next_update: NEXT_UPDATE,
        },
        None => object! {
            dawn: UNKNOWN,
            dusk: UNKNOWN,
            sunrise: UNKNOWN,
            sunset: UNKNOWN,
            gate_open_time: UNKNOWN,
            gate_close_time: UNKNOWN,
            next_update: NEXT_UPDATE,
        },
    }
}

pub trait StatusSink: Send {
    /// Best effort; failures are logged and the next snapshot tries again.
    fn publish(&mut self, snapshot: &JsonValue);
}

/// Status document on disk. Written to a temporary file and renamed over the
/// old one so readers never see a partial document.
pub struct StatusFile {
    path: PathBuf,
    tmp_path: PathBuf,
    failing: bool,
}

impl StatusFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let mut tmp_path = path.clone().into_os_string();
        tmp_path.push(".tmp");
        StatusFile {
            path,
            tmp_path: tmp_path.into(),
            failing: false,
        }
    }

    fn write(&self, snapshot: &JsonValue) -> io::Result<()> {
        fs::write(&self.tmp_path, json::stringify_pretty(snapshot.clone(), 2))?;
        fs::rename(&self.tmp_path, &self.path)
    }
}

impl StatusSink for StatusFile {
    fn publish(&mut self, snapshot: &JsonValue) {
        match self.write(snapshot) {
            Ok(()) => {
                if self.failing {
                    info!("status file {} writable again", self.path.display());
                    self.failing = false;
                }
            }
            Err(err) => {
                // Logged once per outage rather than every tick.
                if !self.failing {
                    warn!("unable to write {}: {}", self.path.display(), err);
                    self.failing = true;
                }
            }
        }
    }
}

/// Latest rendered snapshot, shared with the HTTP server.
#[derive(Clone, Default)]
pub struct SharedStatus {
    latest: Arc<RwLock<Option<String>>>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<String> {
        self.latest.read().ok().and_then(|latest| latest.clone())
    }
}

impl StatusSink for SharedStatus {
    fn publish(&mut self, snapshot: &JsonValue) {
        let body = json::stringify_pretty(snapshot.clone(), 2);
        match self.latest.write() {
            Ok(mut latest) => *latest = Some(body),
            Err(err) => warn!("shared status unavailable: {}", err),
        }
    }
}
