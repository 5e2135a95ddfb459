//! Concrete [`GateIo`] implementations: Raspberry Pi GPIO and a simulation.

use log::info;
use rppal::gpio::{Gpio, InputPin, Level, OutputPin};

use crate::driver::GateIo;
use crate::gate::{CLOSED_POSITION, OPEN_POSITION, TICK_SECS};

/// Relays and the closed switch wired to the Pi header.
///
/// The closed switch is normally closed and pulled up, so the input reads high
/// once the gate has pushed it open.
pub struct PiGateIo {
    closed_switch: InputPin,
    forward_relay: OutputPin,
    reverse_relay: OutputPin,
}

impl PiGateIo {
    pub fn new(
        closed_switch_pin: u8,
        forward_pin: u8,
        reverse_pin: u8,
    ) -> rppal::gpio::Result<Self> {
        let gpio = Gpio::new()?;
        let closed_switch = gpio.get(closed_switch_pin)?.into_input_pullup();
        let mut forward_relay = gpio.get(forward_pin)?.into_output();
        let mut reverse_relay = gpio.get(reverse_pin)?.into_output();
        forward_relay.set_low();
        reverse_relay.set_low();
        Ok(PiGateIo {
            closed_switch,
            forward_relay,
            reverse_relay,
        })
    }
}

impl GateIo for PiGateIo {
    fn closed_switch_pressed(&mut self) -> bool {
        self.closed_switch.read() == Level::High
    }

    fn set_relays(&mut self, forward: bool, reverse: bool) {
        self.forward_relay.write(level(forward));
        self.reverse_relay.write(level(reverse));
    }

    fn cleanup(&mut self) {
        self.forward_relay.set_low();
        self.reverse_relay.set_low();
        info!("relays released");
    }
}

fn level(on: bool) -> Level {
    if on {
        Level::High
    } else {
        Level::Low
    }
}

/// Where the simulated switch starts reporting "closed".
pub const SIM_SWITCH_POSITION: f64 = 95.0;

/// Simulated gate mechanics for running without GPIO.
///
/// The physical position follows the relays at the configured travel rates and
/// the closed switch asserts near the closed end. The simulation advances one
/// tick per [`GateIo::sample_switch`]; other switch reads leave it in place.
pub struct SimGateIo {
    position: f64,
    open_rate: f64,
    close_rate: f64,
    forward: bool,
    reverse: bool,
}

impl SimGateIo {
    pub fn new(position: f64, open_time: f64, close_time: f64) -> Self {
        SimGateIo {
            position,
            open_rate: 100.0 / open_time,
            close_rate: 100.0 / close_time,
            forward: false,
            reverse: false,
        }
    }

    /// Move the simulated gate by `elapsed` seconds of relay drive.
    pub fn step(&mut self, elapsed: f64) {
        match (self.forward, self.reverse) {
            (true, false) => self.position -= elapsed * self.open_rate,
            (false, true) => self.position += elapsed * self.close_rate,
            _ => {}
        }
        self.position = self.position.max(OPEN_POSITION).min(CLOSED_POSITION);
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn relays(&self) -> (bool, bool) {
        (self.forward, self.reverse)
    }
}

impl GateIo for SimGateIo {
    fn closed_switch_pressed(&mut self) -> bool {
        self.position >= SIM_SWITCH_POSITION
    }

    fn sample_switch(&mut self) -> bool {
        self.step(TICK_SECS);
        self.closed_switch_pressed()
    }

    fn set_relays(&mut self, forward: bool, reverse: bool) {
        info!("sim relays forward={} reverse={}", forward, reverse);
        self.forward = forward;
        self.reverse = reverse;
    }

    fn cleanup(&mut self) {
        self.set_relays(false, false);
    }
}
