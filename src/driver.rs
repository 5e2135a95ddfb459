use log::info;

use crate::gate::{Gate, CLOSED_POSITION, OPEN_POSITION, TICK_SECS};
use crate::mailbox::GateCmd;

/// The physical side of the gate: one closed-limit switch and a pair of
/// direction relays.
pub trait GateIo {
    fn closed_switch_pressed(&mut self) -> bool;

    /// The once-per-tick switch read made by [`GateDriver::tick`].
    fn sample_switch(&mut self) -> bool {
        self.closed_switch_pressed()
    }

    fn set_relays(&mut self, forward: bool, reverse: bool);

    /// Release outputs on shutdown. Both relays end up off.
    fn cleanup(&mut self);
}

/// Couples a [`Gate`] to its switch input and relay outputs.
pub struct GateDriver<I> {
    gate: Gate,
    io: I,
    prev_cmd: GateCmd,
}

impl<I: GateIo> GateDriver<I> {
    /// Seeds the gate position from the switch so no full traversal is needed
    /// after a restart.
    pub fn new(gate: Gate, io: I) -> Self {
        let mut driver = GateDriver {
            gate,
            io,
            prev_cmd: GateCmd::None,
        };
        let position = if driver.is_switch_pressed() {
            CLOSED_POSITION
        } else {
            OPEN_POSITION
        };
        driver.reset_position_to(position);
        driver
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut Gate {
        &mut self.gate
    }

    pub fn io(&self) -> &I {
        &self.io
    }

    pub fn is_switch_pressed(&mut self) -> bool {
        self.io.closed_switch_pressed()
    }

    pub fn tick(&mut self) {
        let pressed = self.io.sample_switch();
        self.gate.set_closed_switch(pressed);
        // No open switch is fitted.
        self.gate.set_open_switch(false);

        self.gate.tick(TICK_SECS);

        let cmd = self.gate.cmd();
        if cmd != self.prev_cmd {
            self.prev_cmd = cmd;
            match cmd {
                GateCmd::Open => self.io.set_relays(true, false),
                GateCmd::Close => self.io.set_relays(false, true),
                GateCmd::Stop | GateCmd::None => self.io.set_relays(false, false),
            }
        }
    }

    pub fn position(&self) -> f64 {
        self.gate.position()
    }

    pub fn reset_position_to(&mut self, position: f64) {
        info!("position reset to {}", position);
        self.gate.reset_position_to(position);
    }

    pub fn open(&mut self) {
        self.gate.open()
    }

    pub fn close(&mut self) {
        self.gate.close()
    }

    pub fn stop(&mut self) {
        self.gate.stop()
    }

    pub fn cleanup(&mut self) {
        self.io.cleanup();
        self.prev_cmd = GateCmd::None;
    }
}
