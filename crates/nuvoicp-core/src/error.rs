//! Error types for nuvoicp-core
//!
//! `Error` is the transport-level fault type shared by every `IcpTransport`
//! implementation. It is `Copy` and `no_std` compatible so it can be carried
//! inside the workflow error types without allocation.

use core::fmt;

/// Transport fault - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Session errors
    /// The programmer (GPIO lines, USB bridge, ...) could not be initialized
    InitFailed,
    /// A transport operation was attempted before `init()` or after `shutdown()`
    NotInitialized,
    /// The device did not answer after the re-entry sequence ran out of attempts
    ReentryFailed {
        /// Number of attempts that were made
        attempts: u32,
    },
    /// The device stopped answering ICP commands
    NoResponse,

    // Flash errors
    /// Read operation failed
    ReadError,
    /// Write/program operation failed
    WriteError,
    /// Mass erase failed
    EraseError,

    // Address/size errors
    /// Address is outside the flash or configuration region
    AddressOutOfBounds {
        /// Start address of the rejected access
        addr: u32,
        /// Length of the rejected access
        len: usize,
    },

    // Pin errors
    /// A GPIO line could not be driven or sampled
    PinError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => write!(f, "failed to initialize ICP programmer"),
            Self::NotInitialized => write!(f, "ICP programmer not initialized"),
            Self::ReentryFailed { attempts } => {
                write!(f, "device did not respond after {} re-entry attempts", attempts)
            }
            Self::NoResponse => write!(f, "device not responding"),
            Self::ReadError => write!(f, "read operation failed"),
            Self::WriteError => write!(f, "write operation failed"),
            Self::EraseError => write!(f, "mass erase failed"),
            Self::AddressOutOfBounds { addr, len } => write!(
                f,
                "access of {} bytes at 0x{:05X} is out of bounds",
                len, addr
            ),
            Self::PinError => write!(f, "GPIO line access failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
