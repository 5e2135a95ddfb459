//! Gate position and motion state machine.
//!
//! Position runs from 0 (fully open) to 100 (fully closed). The gate has no
//! encoder: position is dead-reckoned from the motion intent and the configured
//! travel times, and corrected by the limit switches. Commands only move the
//! target position; every [`Gate::tick`] derives the motion from the target and
//! the current position.

use std::fmt;

use log::{error, info, warn};

use crate::diagnostics::DiagnosticLog;
use crate::mailbox::GateCmd;
use crate::notify::Notifier;

pub const OPEN_POSITION: f64 = 0.0;
pub const CLOSED_POSITION: f64 = 100.0;
/// The closed switch asserts "at least this closed"; it can fire a little early.
pub const NEAR_CLOSED_POSITION: f64 = 90.0;
/// Seconds between control ticks.
pub const TICK_SECS: f64 = 0.1;

pub const DEFAULT_OPEN_TIME_SECS: f64 = 330.0;
pub const DEFAULT_CLOSE_TIME_SECS: f64 = 390.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Motion {
    Stop,
    Opening,
    Closing,
}

impl From<Motion> for GateCmd {
    fn from(motion: Motion) -> Self {
        match motion {
            Motion::Stop => GateCmd::Stop,
            Motion::Opening => GateCmd::Open,
            Motion::Closing => GateCmd::Close,
        }
    }
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Motion::Stop => f.write_str("stopped"),
            Motion::Opening => f.write_str("opening"),
            Motion::Closing => f.write_str("closing"),
        }
    }
}

/// Read-only snapshot of the gate.
#[derive(Clone, Debug, PartialEq)]
pub struct GateStatus {
    pub position: f64,
    pub target_position: f64,
    pub is_opening: bool,
    pub is_closing: bool,
    pub is_moving: bool,
    pub open_disabled: bool,
    pub closed_switch_pressed: bool,
    pub open_switch_pressed: bool,
    pub errors: Vec<String>,
    pub diagnostic_messages: Vec<String>,
}

pub struct Gate {
    position: f64,
    target: f64,
    motion: Motion,
    closed_switch: bool,
    open_switch: bool,
    open_time: f64,
    open_rate: f64,
    close_rate: f64,
    // Seconds spent opening while the closed switch stays pressed.
    opening_on_switch: f64,
    // Latched by any fault; cleared only by clear_errors.
    open_disabled: bool,
    errors: Vec<String>,
    diagnostics: DiagnosticLog,
    notifier: Box<dyn Notifier>,
}

impl Gate {
    /// `open_time` and `close_time` are the seconds a full traversal takes and
    /// must be positive.
    pub fn new(
        init_position: f64,
        open_time: f64,
        close_time: f64,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let position = clamp(init_position);
        let mut gate = Gate {
            position,
            target: position,
            motion: Motion::Stop,
            closed_switch: false,
            open_switch: false,
            open_time,
            open_rate: 100.0 / open_time,
            close_rate: 100.0 / close_time,
            opening_on_switch: 0.0,
            open_disabled: false,
            errors: Vec::new(),
            diagnostics: DiagnosticLog::new(),
            notifier,
        };
        gate.diagnose(&format!("Gate initialised at {:.1}%", position));
        gate
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn target_position(&self) -> f64 {
        self.target
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    /// The motion command the actuator should be executing.
    pub fn cmd(&self) -> GateCmd {
        self.motion.into()
    }

    pub fn is_opening(&self) -> bool {
        self.motion == Motion::Opening
    }

    pub fn is_closing(&self) -> bool {
        self.motion == Motion::Closing
    }

    pub fn is_moving(&self) -> bool {
        self.motion != Motion::Stop
    }

    pub fn open_disabled(&self) -> bool {
        self.open_disabled
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    pub fn set_closed_switch(&mut self, pressed: bool) {
        self.closed_switch = pressed;
    }

    pub fn set_open_switch(&mut self, pressed: bool) {
        self.open_switch = pressed;
    }

    pub fn open(&mut self) {
        if self.open_disabled {
            let message = format!(
                "Open rejected: opening disabled by {} latched error(s)",
                self.errors.len()
            );
            warn!("{}", message);
            self.diagnostics.push(&message);
            return;
        }
        info!("gate open requested");
        self.target = OPEN_POSITION;
    }

    pub fn close(&mut self) {
        info!("gate close requested");
        self.target = CLOSED_POSITION;
    }

    pub fn stop(&mut self) {
        info!("gate stop requested at {:.1}%", self.position);
        self.target = self.position;
    }

    /// Re-seed the position estimate. Position and target become equal, so the
    /// gate is at rest and any pending mismatch is forgotten.
    pub fn reset_position_to(&mut self, position: f64) {
        let position = clamp(position);
        self.position = position;
        self.target = position;
        self.motion = Motion::Stop;
        self.diagnose(&format!("Position reset to {:.1}%", position));
    }

    pub fn clear_errors(&mut self) {
        let count = self.errors.len();
        self.errors.clear();
        self.open_disabled = false;
        self.diagnose(&format!("Cleared {} error(s)", count));
    }

    pub fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
        info!("diagnostic log cleared");
    }

    /// Advance the state machine by `elapsed` seconds.
    pub fn tick(&mut self, elapsed: f64) {
        let previous = self.position;

        if self.closed_switch {
            self.position = self.position.max(NEAR_CLOSED_POSITION);
        } else if self.open_switch {
            self.position = OPEN_POSITION;
        }

        let mut intent = self.desired_motion();
        if intent == Motion::Opening
            && self.motion != Motion::Opening
            && self.closed_switch
            && previous < NEAR_CLOSED_POSITION
        {
            self.latch_fault(format!(
                "Closed switch pressed while opening from {:.1}%: position and switch disagree",
                previous
            ));
            intent = Motion::Stop;
        }

        // The switch keeps position at or above 90, so a gate opening against a
        // stuck switch never reaches 0. Give it one full open time.
        if intent == Motion::Opening && self.motion == Motion::Opening && self.closed_switch {
            self.opening_on_switch += elapsed;
            if self.opening_on_switch >= self.open_time {
                self.latch_fault(String::from(
                    "Gate finished opening but the closed switch is still pressed",
                ));
                intent = Motion::Stop;
            }
        } else {
            self.opening_on_switch = 0.0;
        }

        if self.closed_switch {
            // A held switch must not stop a close from finishing.
            if intent == Motion::Closing {
                self.advance(intent, elapsed);
            }
        } else if !self.open_switch {
            self.advance(intent, elapsed);
        }

        // A short move can start and finish within one tick; both transitions
        // still happen.
        if intent != self.motion {
            self.transition(intent);
        }
        let next = self.desired_motion();
        if next != self.motion {
            self.transition(next);
        }
    }

    pub fn status(&self) -> GateStatus {
        GateStatus {
            position: self.position,
            target_position: self.target,
            is_opening: self.is_opening(),
            is_closing: self.is_closing(),
            is_moving: self.is_moving(),
            open_disabled: self.open_disabled,
            closed_switch_pressed: self.closed_switch,
            open_switch_pressed: self.open_switch,
            errors: self.errors.clone(),
            diagnostic_messages: self.diagnostics.to_vec(),
        }
    }

    fn desired_motion(&self) -> Motion {
        if self.target < self.position {
            if self.open_disabled {
                Motion::Stop
            } else {
                Motion::Opening
            }
        } else if self.target > self.position {
            Motion::Closing
        } else {
            Motion::Stop
        }
    }

    // Never steps past the target, so a completed move lands on it exactly.
    fn advance(&mut self, intent: Motion, elapsed: f64) {
        self.position = match intent {
            Motion::Opening => (self.position - elapsed * self.open_rate).max(self.target),
            Motion::Closing => (self.position + elapsed * self.close_rate).min(self.target),
            Motion::Stop => self.position,
        };
        self.position = clamp(self.position);
    }

    fn transition(&mut self, next: Motion) {
        if next == Motion::Stop {
            if self.motion == Motion::Closing
                && self.position >= CLOSED_POSITION
                && !self.closed_switch
            {
                self.latch_fault(String::from(
                    "Gate finished closing but the closed switch is not pressed",
                ));
            }
        }

        let message = match next {
            Motion::Stop => format!("Gate stopped at {:.1}%", self.position),
            Motion::Opening => format!("Gate opening from {:.1}%", self.position),
            Motion::Closing => format!("Gate closing from {:.1}%", self.position),
        };
        self.motion = next;
        self.diagnose(&message);
    }

    fn latch_fault(&mut self, message: String) {
        error!("{}", message);
        self.diagnostics.push(&format!("ERROR: {}", message));
        self.open_disabled = true;
        if !self.notifier.notify(&message) {
            self.diagnostics.push("Notification could not be sent");
        }
        if !self.errors.contains(&message) {
            self.errors.push(message);
        }
    }

    fn diagnose(&mut self, message: &str) {
        info!("{}", message);
        self.diagnostics.push(message);
    }
}

fn clamp(position: f64) -> f64 {
    if position.is_nan() {
        return OPEN_POSITION;
    }
    position.max(OPEN_POSITION).min(CLOSED_POSITION)
}
