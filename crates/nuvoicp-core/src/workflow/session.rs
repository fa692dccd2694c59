//! Session bootstrap
//!
//! A [`Session`] borrows the transport for the duration of one workflow
//! invocation. It is created by [`bootstrap`], which enters ICP mode and
//! identifies the device, and it shuts the transport down when dropped, so
//! every exit path releases the programmer exactly once.

use core::fmt;

use crate::config::ConfigBytes;
use crate::device::{DeviceIdentity, DeviceLayout, CFG_FLASH_LEN};
use crate::error::{Error, Result};
use crate::icp::{IcpTransport, ReentryTiming};

/// Errors raised while establishing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapError {
    /// The transport could not be initialized
    TransportInitFailed(Error),
    /// The device reported the locked sentinel and did not come back
    /// after the re-entry sequence
    ReentryFailed(Error),
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportInitFailed(e) => write!(f, "failed to initialize ICP: {}", e),
            Self::ReentryFailed(e) => write!(f, "re-entry into ICP mode failed: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TransportInitFailed(e) | Self::ReentryFailed(e) => Some(e),
        }
    }
}

/// Read every identity register
pub fn read_identity<T: IcpTransport + ?Sized>(transport: &mut T) -> DeviceIdentity {
    DeviceIdentity {
        device_id: transport.read_device_id(),
        company_id: transport.read_cid(),
        uid: transport.read_uid(),
        ucid: transport.read_ucid(),
    }
}

/// An active programming session
pub struct Session<'t, T: IcpTransport + ?Sized> {
    transport: &'t mut T,
    timing: ReentryTiming,
    identity: DeviceIdentity,
    config: Option<ConfigBytes>,
    target_confirmed: bool,
}

impl<'t, T: IcpTransport + ?Sized> Session<'t, T> {
    /// Identity as last read from the device
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Configuration bytes, once read by the inspector
    pub fn config(&self) -> Option<ConfigBytes> {
        self.config
    }

    /// Whether the inspector confirmed the device as the target model
    pub fn is_target_confirmed(&self) -> bool {
        self.target_confirmed
    }

    pub(crate) fn set_target_confirmed(&mut self, confirmed: bool) {
        self.target_confirmed = confirmed;
    }

    /// Re-entry timing used by this session
    pub fn timing(&self) -> &ReentryTiming {
        &self.timing
    }

    /// Direct access to the transport
    pub fn transport(&mut self) -> &mut T {
        &mut *self.transport
    }

    /// Read the configuration bytes and remember them
    pub fn read_config(&mut self, layout: &DeviceLayout) -> Result<ConfigBytes> {
        let mut raw = [0u8; CFG_FLASH_LEN];
        self.transport.read_flash(layout.cfg_addr, &mut raw)?;
        let config = ConfigBytes::from_bytes(raw);
        self.config = Some(config);
        Ok(config)
    }

    /// Run the re-entry sequence and re-read the identity
    pub fn reenter(&mut self) -> Result<()> {
        self.transport.reentry(&self.timing)?;
        self.identity = read_identity(&mut *self.transport);
        log::debug!(
            "After re-entry: device ID 0x{:04x}, CID 0x{:02x}",
            self.identity.device_id,
            self.identity.company_id
        );
        Ok(())
    }
}

impl<T: IcpTransport + ?Sized> Drop for Session<'_, T> {
    fn drop(&mut self) {
        self.transport.shutdown();
    }
}

impl<T: IcpTransport + ?Sized> fmt::Debug for Session<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .field("target_confirmed", &self.target_confirmed)
            .finish()
    }
}

/// Enter ICP mode and identify the device
///
/// A device reporting the locked company ID sentinel is put through the
/// re-entry sequence and identified again. The model is not checked here.
pub fn bootstrap<'t, T: IcpTransport + ?Sized>(
    transport: &'t mut T,
    timing: ReentryTiming,
) -> core::result::Result<Session<'t, T>, BootstrapError> {
    if let Err(e) = transport.init() {
        transport.shutdown();
        return Err(BootstrapError::TransportInitFailed(e));
    }

    let identity = read_identity(&mut *transport);
    let mut session = Session {
        transport,
        timing,
        identity,
        config: None,
        target_confirmed: false,
    };

    if session.identity.is_locked_sentinel() {
        log::info!("Device reports locked CID, re-entering ICP mode");
        session.reenter().map_err(BootstrapError::ReentryFailed)?;
    }

    Ok(session)
}
