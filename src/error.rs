//! # Error Types
//!
//! Custom error types for FC Telemetry using `thiserror`.
//!
//! Only the configuration loader and the host serial driver return these.
//! The telemetry lifecycle itself never fails towards its caller.

use thiserror::Error;

use crate::serial::SerialFunction;

/// Main error type for FC Telemetry
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No physical port is mapped to the requested function
    #[error("No serial port assigned to function {0:?}")]
    PortNotAssigned(SerialFunction),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for FC Telemetry
pub type Result<T> = std::result::Result<T, TelemetryError>;
