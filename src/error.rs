//! Error type shared by the backend internals.
//!
//! The consumer-facing query surface never returns these: lookups fall back to
//! documented sentinels and decode failures become `Disconnected` events. Errors
//! only surface from constructors and configuration loading.

use crate::registry::DeviceId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Device node or OS handle I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A platform API returned a failure code.
    #[error("platform call failed: {0}")]
    Platform(String),

    /// No connected device carries this id.
    #[error("unknown device id {0}")]
    UnknownDevice(DeviceId),

    /// The device or backend cannot perform the operation.
    #[error("operation unsupported: {0}")]
    Unsupported(&'static str),

    /// The background event-loop thread failed to start.
    #[error("failed to start backend thread: {0}")]
    ThreadStart(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;
