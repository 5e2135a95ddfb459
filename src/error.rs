use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("gpio: {0}")]
    Gpio(#[from] rppal::gpio::Error),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("http server: {0}")]
    Http(Box<dyn std::error::Error + Send + Sync + 'static>),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config: {0}")]
    Io(#[from] io::Error),
    #[error("unable to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("invalid reset position: {0}")]
    InvalidPosition(String),
    #[error("reset position out of range: {0}")]
    OutOfRange(i64),
    #[error("command inbox unavailable")]
    Unavailable,
}
