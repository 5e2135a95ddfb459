use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// A discrete gate command. `None` means nothing is pending.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateCmd {
    None = 0,
    Stop = 1,
    Open = 2,
    Close = 3,
}

impl From<u8> for GateCmd {
    fn from(val: u8) -> Self {
        use GateCmd::*;
        match val {
            0 => None,
            1 => Stop,
            2 => Open,
            3 => Close,
            _ => unreachable!(),
        }
    }
}

/// Single-slot, overwrite-on-write mailbox shared between threads.
///
/// Posting replaces whatever is pending; `take` returns the pending command and
/// clears the slot in one atomic step.
#[derive(Clone)]
pub struct CmdMailbox {
    slot: Arc<AtomicU8>,
}

impl CmdMailbox {
    pub fn new() -> Self {
        CmdMailbox {
            slot: Arc::new(AtomicU8::new(GateCmd::None as u8)),
        }
    }

    pub fn post(&self, cmd: GateCmd) {
        self.slot.store(cmd as u8, Ordering::SeqCst)
    }

    #[inline]
    pub fn take(&self) -> GateCmd {
        self.slot.swap(GateCmd::None as u8, Ordering::SeqCst).into()
    }

    #[cfg(test)]
    fn peek(&self) -> GateCmd {
        self.slot.load(Ordering::SeqCst).into()
    }
}

impl Default for CmdMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GateCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateCmd::None => f.write_str("NONE"),
            GateCmd::Stop => f.write_str("STOP"),
            GateCmd::Open => f.write_str("OPEN"),
            GateCmd::Close => f.write_str("CLOSE"),
        }
    }
}
