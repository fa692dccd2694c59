//! State inspection
//!
//! Decides whether the requested operation may proceed on the device that
//! answered. Nothing here mutates the device: every refusal happens before
//! the sequencer issues its first erase or write.

use core::fmt;

use super::session::Session;
use crate::config::ConfigBytes;
use crate::device::{DeviceIdentity, DeviceLayout};
use crate::error::Error;
use crate::icp::IcpTransport;

/// Requested operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Show identity and configuration only
    DumpConfig,
    /// Read the whole flash
    Read,
    /// Program the selected regions
    Write {
        /// Program the application region
        aprom: bool,
        /// Program the loader region and boot from it
        ldrom: bool,
    },
}

impl Operation {
    /// Whether the operation erases and rewrites the device
    pub fn is_destructive(&self) -> bool {
        matches!(self, Operation::Write { aprom, ldrom } if *aprom || *ldrom)
    }
}

/// Result of a successful inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// Identity of the device
    pub identity: DeviceIdentity,
    /// Configuration bytes currently on the device
    pub config: ConfigBytes,
    /// The device did not match and proceeds only because a mass erase
    /// was confirmed
    pub recovery: bool,
}

/// Reasons the requested operation may not proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionError {
    /// The device ID does not match the expected model
    UnsupportedDevice {
        /// What the device reported
        identity: DeviceIdentity,
        /// Confirming a mass erase would allow a write to proceed
        recoverable: bool,
    },
    /// The flash is read-protected and the operation does not erase it
    DeviceLocked {
        /// What the device reported
        identity: DeviceIdentity,
        /// Configuration bytes showing the lock
        config: ConfigBytes,
    },
    /// A write was requested with no region selected
    NothingToDo,
    /// Reading the configuration bytes failed
    Transport(Error),
}

impl fmt::Display for InspectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedDevice { identity, recoverable } => {
                write!(f, "unsupported device ID 0x{:04x}", identity.device_id)?;
                if *recoverable {
                    write!(f, " (may be locked, a mass erase could recover it)")?;
                }
                Ok(())
            }
            Self::DeviceLocked { .. } => write!(f, "device is locked, cannot read flash"),
            Self::NothingToDo => write!(f, "no region selected for writing"),
            Self::Transport(e) => write!(f, "failed to read configuration: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InspectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

/// Check that `operation` may run on the session's device
///
/// A device that does not match `layout` is only accepted when the
/// operation is destructive, the device reports the locked sentinel and the
/// caller already confirmed the mass erase.
pub fn inspect<T: IcpTransport + ?Sized>(
    session: &mut Session<'_, T>,
    layout: &DeviceLayout,
    operation: Operation,
    mass_erase_confirmed: bool,
) -> Result<Readiness, InspectionError> {
    if let Operation::Write { aprom: false, ldrom: false } = operation {
        return Err(InspectionError::NothingToDo);
    }

    let identity = *session.identity();
    let matches = identity.matches(layout);
    let recovery = if matches {
        false
    } else {
        let recoverable = operation.is_destructive() && identity.is_locked_sentinel();
        if !(recoverable && mass_erase_confirmed) {
            return Err(InspectionError::UnsupportedDevice {
                identity,
                recoverable,
            });
        }
        log::warn!(
            "{} not found (device ID 0x{:04x}), proceeding with mass erase",
            layout.name,
            identity.device_id
        );
        true
    };
    session.set_target_confirmed(matches);

    let config = session
        .read_config(layout)
        .map_err(InspectionError::Transport)?;
    if config.is_locked() && !operation.is_destructive() {
        return Err(InspectionError::DeviceLocked { identity, config });
    }

    Ok(Readiness {
        identity,
        config,
        recovery,
    })
}
