//! Error types for the t2 renderer core.

use std::path::PathBuf;
use thiserror::Error;

use crate::sampling::MAX_SAMPLE_ROOT;

/// Main error type for renderer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Sample root outside `1..=MAX_SAMPLE_ROOT`
    #[error("Invalid sample root {0} (must be between 1 and {MAX_SAMPLE_ROOT})")]
    InvalidSampleRoot(u32),

    /// Command-line or settings value out of range
    #[error("Invalid value for {name}: {value}")]
    InvalidArgument { name: &'static str, value: String },

    /// Log level name not recognized
    #[error("Unknown log level: {0}")]
    UnknownLogLevel(String),

    /// Device memory could not be allocated
    #[error("Allocation failed for {what}: {reason}")]
    Allocation { what: &'static str, reason: String },

    /// Host to device transfer failed
    #[error("Transfer to {what} failed: {reason}")]
    Transfer { what: &'static str, reason: String },

    /// Kernel dispatch failed
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// Image copy failed
    #[error("Image copy failed: {0}")]
    Copy(String),

    /// Device or adapter could not be acquired
    #[error("Device error: {0}")]
    Device(String),

    /// Kernel source could not be loaded or built
    #[error("Kernel build failed for {path}: {reason}")]
    Kernel { path: PathBuf, reason: String },

    /// Image export failed
    #[error("Export failed: {0}")]
    Export(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed
    #[error("Invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid argument error.
    pub fn invalid(name: &'static str, value: impl ToString) -> Self {
        Self::InvalidArgument { name, value: value.to_string() }
    }
}

/// Result type alias for renderer operations.
pub type Result<T> = std::result::Result<T, Error>;
