//! Render-wide configuration.
//!
//! Layered as `Default` → optional JSON settings file → command-line flags
//! (see [`crate::cli`]). Only explicit user commands mutate it afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::sampling::validate_sample_root;
use crate::util::{Error, Result};

/// Logging verbosity, named as on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    /// Matching `tracing` level.
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownLogLevel(s.to_string()))
    }
}

impl TryFrom<String> for LogLevel {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.name().to_string()
    }
}

/// Render-wide settings that change rarely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Maximum number of reflection bounces.
    pub trace_depth: u32,
    /// `r` such that `r²` samples are accumulated per pixel.
    pub sample_root: u32,
    pub width: u32,
    pub height: u32,
    pub log_level: LogLevel,
    /// Samples per kernel invocation.
    pub batch_size: u32,
    /// No new batches are dispatched while set.
    pub paused: bool,
    pub fullscreen: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            trace_depth: 5,
            sample_root: 4,
            width: 1024,
            height: 768,
            log_level: LogLevel::Info,
            batch_size: 4,
            paused: false,
            fullscreen: false,
        }
    }
}

impl Configuration {
    /// Total samples per pixel at convergence.
    pub fn samples_per_pixel(&self) -> u32 {
        self.sample_root * self.sample_root
    }

    /// Check every field is in its valid range.
    pub fn validate(&self) -> Result<()> {
        validate_sample_root(self.sample_root)?;
        if self.width == 0 {
            return Err(Error::invalid("width", self.width));
        }
        if self.height == 0 {
            return Err(Error::invalid("height", self.height));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid("batch size", self.batch_size));
        }
        Ok(())
    }

    /// Load settings from a JSON file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Save settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }
}
