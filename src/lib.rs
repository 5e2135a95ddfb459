pub mod command;
pub mod config;
pub mod controller;
mod diagnostics;
pub mod driver;
pub mod error;
pub mod gate;
pub mod hardware;
pub mod http;
mod mailbox;
pub mod notify;
pub mod schedule;
pub mod status;
pub mod sun;
pub mod timer;

pub use command::{Command, CommandSource};
pub use controller::Controller;
pub use diagnostics::{DiagnosticLog, MAX_DIAGNOSTICS};
pub use driver::{GateDriver, GateIo};
pub use error::Error;
pub use gate::{Gate, GateStatus, Motion};
pub use mailbox::{CmdMailbox, GateCmd};
pub use notify::Notifier;
pub use schedule::{ScheduleHandle, ScheduleInfo, Scheduler};
pub use sun::{SolarCalculator, SunTimes};
