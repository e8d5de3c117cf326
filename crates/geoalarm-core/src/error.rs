//! Core error types for geoalarm-core.
//!
//! This module defines the error hierarchy using thiserror. Only position
//! failures occur at runtime; the rest guard user input and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for geoalarm-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Position source errors
    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    /// Monitor task errors
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory could not be resolved or created
    #[error("Config directory unavailable: {0}")]
    DirUnavailable(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Latitude or longitude outside the valid range
    #[error("{field} {value} is outside [{min}, {max}]")]
    CoordinateOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Coordinate text could not be parsed
    #[error("cannot parse '{0}' as 'lat,lon'")]
    MalformedCoordinate(String),

    /// Threshold not in the supported set
    #[error("unsupported threshold {0} km (expected one of 2, 3, 4, 5, 10, 20)")]
    UnsupportedThreshold(String),
}

/// Failures reported by a position source.
///
/// These never halt the tracker: a failure only means "no current position".
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    Unavailable,
    #[error("timed out waiting for a position fix")]
    Timeout,
}

/// Errors from talking to a running monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The monitor task has already stopped
    #[error("monitor is no longer running")]
    Stopped,

    /// The monitor task panicked or was aborted
    #[error("monitor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
