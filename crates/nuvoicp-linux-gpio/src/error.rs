//! Error types for Linux GPIO ICP operations

use thiserror::Error;

/// Linux GPIO ICP specific errors
#[derive(Debug, Error)]
pub enum LinuxGpioError {
    /// Failed to request GPIO lines
    #[error("Failed to request GPIO lines on '{path}': {source}")]
    LineRequestFailed {
        path: String,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to reconfigure GPIO lines
    #[error("Failed to reconfigure GPIO lines: {0}")]
    ReconfigureFailed(#[source] gpiocdev::Error),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Both a device path and a chip number were given
    #[error("Only one of 'dev' or 'gpiochip' can be specified")]
    ConflictingDevice,

    /// Invalid GPIO line number
    #[error("Invalid GPIO line number for {name}: {value}")]
    InvalidLineNumber {
        name: &'static str,
        value: String,
    },

    /// Two signals mapped to the same line
    #[error("{first} and {second} cannot share GPIO line {line}")]
    DuplicateLine {
        first: &'static str,
        second: &'static str,
        line: u32,
    },
}

/// Result type for Linux GPIO ICP operations
pub type Result<T> = std::result::Result<T, LinuxGpioError>;
