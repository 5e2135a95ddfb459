//! Daemon configuration.
//!
//! Loaded from a TOML file; every key is optional and falls back to the values
//! the coop was commissioned with.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::gate::{DEFAULT_CLOSE_TIME_SECS, DEFAULT_OPEN_TIME_SECS};

pub const CONFIG_ENV: &str = "CHICKEN_GATE_CONFIG";
pub const WEBHOOK_ENV: &str = "CHICKEN_GATE_WEBHOOK_URL";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Run against simulated gate mechanics instead of GPIO.
    pub simulate: bool,
    pub gate: GateConfig,
    pub gpio: GpioConfig,
    pub schedule: ScheduleConfig,
    pub files: FilesConfig,
    pub http: HttpConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Seconds for a full open traversal.
    pub open_time_secs: f64,
    /// Seconds for a full close traversal.
    pub close_time_secs: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            open_time_secs: DEFAULT_OPEN_TIME_SECS,
            close_time_secs: DEFAULT_CLOSE_TIME_SECS,
        }
    }
}

/// BCM pin numbers.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GpioConfig {
    pub closed_switch_pin: u8, // header pin 3
    pub forward_relay_pin: u8, // header pin 7
    pub reverse_relay_pin: u8, // header pin 11
}

impl Default for GpioConfig {
    fn default() -> Self {
        GpioConfig {
            closed_switch_pin: 2,
            forward_relay_pin: 4,
            reverse_relay_pin: 17,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub latitude: f64,
    pub longitude: f64,
    /// Minutes after dusk the close job runs.
    pub close_offset_minutes: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            enabled: true,
            latitude: 49.164379,
            longitude: -123.936661,
            close_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FilesConfig {
    pub status_file: PathBuf,
    pub command_file: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        FilesConfig {
            status_file: PathBuf::from("gate_status.json"),
            command_file: PathBuf::from("gate_cmd.txt"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub enabled: bool,
    pub addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            enabled: true,
            addr: String::from("0.0.0.0:8888"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, or use the defaults when no file is given. The webhook URL
    /// may be overridden from the environment to keep it out of the file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        if let Ok(url) = env::var(WEBHOOK_ENV) {
            if !url.is_empty() {
                config.notify.webhook_url = Some(url);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let times = [self.gate.open_time_secs, self.gate.close_time_secs];
        if times.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err(ConfigError::Invalid(String::from(
                "gate travel times must be positive",
            )));
        }
        if !(-90.0..=90.0).contains(&self.schedule.latitude)
            || !(-180.0..=180.0).contains(&self.schedule.longitude)
        {
            return Err(ConfigError::Invalid(String::from(
                "schedule latitude/longitude out of range",
            )));
        }
        if !(0..=24 * 60).contains(&self.schedule.close_offset_minutes) {
            return Err(ConfigError::Invalid(String::from(
                "close_offset_minutes must be between 0 and 1440",
            )));
        }
        Ok(())
    }
}
