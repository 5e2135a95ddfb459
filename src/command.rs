//! External commands and the channels that deliver them.
//!
//! Tokens are plain text: `OPEN`, `CLOSE`, `STOP`, `RESET`, `RESET:<0-100>`,
//! `CLEAR_ERRORS`, `CLEAR_DIAGNOSTICS`, `ENABLE_SCHEDULE` and
//! `DISABLE_SCHEDULE`. Each channel holds at most one pending token and is
//! cleared when read.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::error::CommandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Open,
    Close,
    Stop,
    /// `None` resets to whatever the closed switch reports.
    Reset(Option<u8>),
    ClearErrors,
    ClearDiagnostics,
    EnableSchedule,
    DisableSchedule,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let cmd = match token {
            "" => return Err(CommandError::Empty),
            "OPEN" => Command::Open,
            "CLOSE" => Command::Close,
            "STOP" => Command::Stop,
            "RESET" => Command::Reset(None),
            "CLEAR_ERRORS" => Command::ClearErrors,
            "CLEAR_DIAGNOSTICS" => Command::ClearDiagnostics,
            "ENABLE_SCHEDULE" => Command::EnableSchedule,
            "DISABLE_SCHEDULE" => Command::DisableSchedule,
            _ => match token.strip_prefix("RESET:") {
                Some(arg) => {
                    let position: i64 = arg
                        .trim()
                        .parse()
                        .map_err(|_| CommandError::InvalidPosition(arg.to_string()))?;
                    if !(0..=100).contains(&position) {
                        return Err(CommandError::OutOfRange(position));
                    }
                    Command::Reset(Some(position as u8))
                }
                None => return Err(CommandError::Unknown(token.to_string())),
            },
        };
        Ok(cmd)
    }
}

/// A channel polled once per control tick for at most one raw command token.
pub trait CommandSource: Send {
    /// Returns the pending token, if any, and clears the channel.
    fn poll(&mut self) -> Option<String>;
}

/// Command token dropped into a file by a shell script or another process.
/// The file is removed once read.
pub struct CommandFile {
    path: PathBuf,
    failing: bool,
}

impl CommandFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        CommandFile {
            path: path.into(),
            failing: false,
        }
    }

    fn read_and_remove(&self) -> io::Result<Option<String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        fs::remove_file(&self.path)?;
        let token = contents.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }
}

impl CommandSource for CommandFile {
    fn poll(&mut self) -> Option<String> {
        match self.read_and_remove() {
            Ok(token) => {
                if self.failing {
                    info!("command file {} readable again", self.path.display());
                    self.failing = false;
                }
                token
            }
            Err(err) => {
                // Left in place; the next tick tries again. Logged once per outage.
                if !self.failing {
                    warn!("unable to read {}: {}", self.path.display(), err);
                    self.failing = true;
                }
                None
            }
        }
    }
}

/// Single-slot inbox filled by the HTTP server.
#[derive(Clone, Default)]
pub struct CommandInbox {
    slot: Arc<Mutex<Option<String>>>,
}

impl CommandInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any token not yet picked up.
    pub fn submit(&self, token: &str) -> Result<(), CommandError> {
        let mut slot = self.slot.lock().map_err(|_| CommandError::Unavailable)?;
        *slot = Some(token.trim().to_string());
        Ok(())
    }
}

impl CommandSource for CommandInbox {
    fn poll(&mut self) -> Option<String> {
        match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(err) => {
                warn!("command inbox unavailable: {}", err);
                None
            }
        }
    }
}
