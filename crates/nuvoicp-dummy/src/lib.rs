//! nuvoicp-dummy - In-memory N76E003 emulator for testing
//!
//! This crate provides a dummy ICP transport that emulates an N76E003 in
//! memory, including its read protection: a locked chip hides its identity
//! until ICP mode is re-entered, returns erased bytes for flash reads and
//! stops answering after a mass erase until it is re-entered again.
//!
//! Every transport call is recorded so tests can assert the exact order in
//! which the workflow drives the device.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use nuvoicp_core::config::ConfigBytes;
use nuvoicp_core::device::{
    DeviceLayout, CFG_FLASH_LEN, ERASED_BYTE, LOCKED_CID, N76E003_DEVID, UCID_LEN, UID_LEN,
};
use nuvoicp_core::error::{Error, Result};
use nuvoicp_core::icp::{IcpTransport, ReentryTiming};

/// A transport call, as recorded by [`DummyIcp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// `init()`
    Init,
    /// `shutdown()`
    Shutdown,
    /// `reentry()`
    Reentry,
    /// `read_device_id()`
    ReadDeviceId,
    /// `read_cid()`
    ReadCid,
    /// `read_uid()`
    ReadUid,
    /// `read_ucid()`
    ReadUcid,
    /// `read_flash()`
    ReadFlash {
        /// Start address
        addr: u32,
        /// Number of bytes
        len: usize,
    },
    /// `write_flash()`
    WriteFlash {
        /// Start address
        addr: u32,
        /// Number of bytes
        len: usize,
    },
    /// `mass_erase()`
    MassErase,
}

impl Call {
    /// Whether the call changes flash or configuration contents
    pub fn is_mutation(&self) -> bool {
        matches!(self, Call::WriteFlash { .. } | Call::MassErase)
    }
}

/// Configuration for the dummy device
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Device ID
    pub device_id: u16,
    /// Company ID
    pub company_id: u8,
    /// Unique ID
    pub uid: [u8; UID_LEN],
    /// Unique customer ID
    pub ucid: [u8; UCID_LEN],
    /// Flash geometry
    pub layout: DeviceLayout,
    /// Initial configuration bytes
    pub config: ConfigBytes,
    /// Whether a locked chip shows its identity after re-entry. When false,
    /// only a mass erase brings the identity back.
    pub reentry_reveals_identity: bool,
    /// Fail `init()`
    pub fail_init: bool,
    /// Never answer the re-entry sequence
    pub unresponsive: bool,
    /// Fail any write covering this address
    pub fail_write_at: Option<u32>,
    /// Flip bit 7 of the flash byte at this offset when it is programmed
    pub corrupt_at: Option<usize>,
    /// Silently drop writes to the configuration bytes
    pub drop_config_writes: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            device_id: N76E003_DEVID,
            company_id: 0xDA, // Nuvoton
            uid: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC],
            ucid: [0x5A; UCID_LEN],
            layout: DeviceLayout::N76E003,
            config: ConfigBytes::BLANK,
            reentry_reveals_identity: true,
            fail_init: false,
            unresponsive: false,
            fail_write_at: None,
            corrupt_at: None,
            drop_config_writes: false,
        }
    }
}

impl DummyConfig {
    /// A chip with its lock bit asserted
    pub fn locked() -> Self {
        let mut config = ConfigBytes::BLANK;
        config.set_locked(true);
        Self {
            config,
            ..Default::default()
        }
    }
}

/// Dummy ICP transport
///
/// Emulates an N76E003 in memory for testing purposes.
pub struct DummyIcp {
    cfg: DummyConfig,
    flash: Vec<u8>,
    config: [u8; CFG_FLASH_LEN],
    active: bool,
    responsive: bool,
    reentered: bool,
    calls: Vec<Call>,
}

impl DummyIcp {
    /// Create a new dummy device with erased flash
    pub fn new(cfg: DummyConfig) -> Self {
        let flash = vec![ERASED_BYTE; cfg.layout.flash_size];
        let config = *cfg.config.as_bytes();
        Self {
            cfg,
            flash,
            config,
            active: false,
            responsive: true,
            reentered: false,
            calls: Vec::new(),
        }
    }

    /// Create a new dummy N76E003 with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy device with pre-filled flash
    pub fn with_data(cfg: DummyConfig, initial_data: &[u8]) -> Self {
        let mut dev = Self::new(cfg);
        let len = core::cmp::min(initial_data.len(), dev.flash.len());
        dev.flash[..len].copy_from_slice(&initial_data[..len]);
        dev
    }

    /// Flash contents
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Configuration bytes currently stored
    pub fn config(&self) -> ConfigBytes {
        ConfigBytes::from_bytes(self.config)
    }

    /// Recorded transport calls, oldest first
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Forget the recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Whether ICP mode is active
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn is_locked(&self) -> bool {
        self.config().is_locked()
    }

    fn identity_visible(&self) -> bool {
        !self.is_locked() || (self.reentered && self.cfg.reentry_reveals_identity)
    }

    /// Value an identity register reads as: `None` when the device does not
    /// drive DAT at all, `Some(false)` when it answers with the locked
    /// sentinel
    fn identity_state(&self) -> Option<bool> {
        if !self.active || !self.responsive {
            None
        } else {
            Some(self.identity_visible())
        }
    }

    fn check_ready(&self) -> Result<()> {
        if !self.active {
            Err(Error::NotInitialized)
        } else if !self.responsive {
            Err(Error::NoResponse)
        } else {
            Ok(())
        }
    }

    fn cfg_range(&self, addr: u32, len: usize) -> Option<usize> {
        let start = addr.checked_sub(self.cfg.layout.cfg_addr)? as usize;
        (start.checked_add(len)? <= CFG_FLASH_LEN).then_some(start)
    }

    fn flash_range(&self, addr: u32, len: usize) -> Option<usize> {
        let start = addr.checked_sub(self.cfg.layout.aprom_addr)? as usize;
        (start.checked_add(len)? <= self.flash.len()).then_some(start)
    }
}

impl IcpTransport for DummyIcp {
    fn init(&mut self) -> Result<()> {
        self.calls.push(Call::Init);
        if self.cfg.fail_init {
            return Err(Error::InitFailed);
        }
        self.active = true;
        self.reentered = false;
        log::debug!("dummy: entered ICP mode");
        Ok(())
    }

    fn shutdown(&mut self) {
        self.calls.push(Call::Shutdown);
        self.active = false;
        log::debug!("dummy: left ICP mode");
    }

    fn reentry(&mut self, timing: &ReentryTiming) -> Result<()> {
        self.calls.push(Call::Reentry);
        if !self.active {
            return Err(Error::NotInitialized);
        }
        if self.cfg.unresponsive {
            return Err(Error::ReentryFailed {
                attempts: timing.max_attempts,
            });
        }
        self.responsive = true;
        self.reentered = true;
        Ok(())
    }

    fn read_device_id(&mut self) -> u16 {
        self.calls.push(Call::ReadDeviceId);
        match self.identity_state() {
            None => 0,
            Some(false) => 0xFFFF,
            Some(true) => self.cfg.device_id,
        }
    }

    fn read_cid(&mut self) -> u8 {
        self.calls.push(Call::ReadCid);
        match self.identity_state() {
            None => 0,
            Some(false) => LOCKED_CID,
            Some(true) => self.cfg.company_id,
        }
    }

    fn read_uid(&mut self) -> [u8; UID_LEN] {
        self.calls.push(Call::ReadUid);
        match self.identity_state() {
            None => [0; UID_LEN],
            Some(false) => [0xFF; UID_LEN],
            Some(true) => self.cfg.uid,
        }
    }

    fn read_ucid(&mut self) -> [u8; UCID_LEN] {
        self.calls.push(Call::ReadUcid);
        match self.identity_state() {
            None => [0; UCID_LEN],
            Some(false) => [0xFF; UCID_LEN],
            Some(true) => self.cfg.ucid,
        }
    }

    fn read_flash(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.calls.push(Call::ReadFlash {
            addr,
            len: buf.len(),
        });
        self.check_ready()?;

        if let Some(start) = self.cfg_range(addr, buf.len()) {
            buf.copy_from_slice(&self.config[start..start + buf.len()]);
        } else if let Some(start) = self.flash_range(addr, buf.len()) {
            if self.is_locked() {
                buf.fill(ERASED_BYTE);
            } else {
                buf.copy_from_slice(&self.flash[start..start + buf.len()]);
            }
        } else {
            return Err(Error::AddressOutOfBounds {
                addr,
                len: buf.len(),
            });
        }
        Ok(())
    }

    fn write_flash(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.calls.push(Call::WriteFlash {
            addr,
            len: data.len(),
        });
        self.check_ready()?;

        if let Some(bad) = self.cfg.fail_write_at {
            let end = u64::from(addr) + data.len() as u64;
            if (u64::from(addr)..end).contains(&u64::from(bad)) {
                return Err(Error::WriteError);
            }
        }

        // A locked chip ignores programming until it is erased
        let locked = self.is_locked();

        if let Some(start) = self.cfg_range(addr, data.len()) {
            if !locked && !self.cfg.drop_config_writes {
                for (i, &byte) in data.iter().enumerate() {
                    self.config[start + i] &= byte;
                }
            }
        } else if let Some(start) = self.flash_range(addr, data.len()) {
            if !locked {
                // Flash programming: can only change 1 -> 0
                for (i, &byte) in data.iter().enumerate() {
                    let offset = start + i;
                    self.flash[offset] &= byte;
                    if self.cfg.corrupt_at == Some(offset) {
                        self.flash[offset] ^= 0x80;
                    }
                }
            }
        } else {
            return Err(Error::AddressOutOfBounds {
                addr,
                len: data.len(),
            });
        }
        Ok(())
    }

    fn mass_erase(&mut self) -> Result<()> {
        self.calls.push(Call::MassErase);
        self.check_ready()?;

        let was_locked = self.is_locked();
        self.flash.fill(ERASED_BYTE);
        self.config = [ERASED_BYTE; CFG_FLASH_LEN];
        if was_locked {
            // The erase reloads the protection state and drops the session
            self.responsive = false;
            self.reentered = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlocked_identity() {
        let mut dev = DummyIcp::new_default();
        dev.init().unwrap();
        assert_eq!(dev.read_device_id(), N76E003_DEVID);
        assert_eq!(dev.read_cid(), 0xDA);
    }

    #[test]
    fn test_access_at_top_of_address_space() {
        let cfg = DummyConfig {
            fail_write_at: Some(0x10),
            ..Default::default()
        };
        let mut dev = DummyIcp::new(cfg);
        dev.init().unwrap();
        assert_eq!(
            dev.write_flash(u32::MAX - 1, &[0; 8]),
            Err(Error::AddressOutOfBounds {
                addr: u32::MAX - 1,
                len: 8
            })
        );
        let mut buf = [0u8; 4];
        assert!(matches!(
            dev.read_flash(u32::MAX, &mut buf),
            Err(Error::AddressOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut dev = DummyIcp::with_data(DummyConfig::default(), &[0xF0]);
        dev.init().unwrap();
        dev.write_flash(0, &[0x3C]).unwrap();
        assert_eq!(dev.flash()[0], 0x30);
    }

    #[test]
    fn test_locked_chip() {
        let mut dev = DummyIcp::with_data(DummyConfig::locked(), &[0x12, 0x34]);
        dev.init().unwrap();
        assert_eq!(dev.read_cid(), LOCKED_CID);
        assert_eq!(dev.read_device_id(), 0xFFFF);

        dev.reentry(&ReentryTiming::default()).unwrap();
        assert_eq!(dev.read_device_id(), N76E003_DEVID);

        let mut buf = [0u8; 2];
        dev.read_flash(0, &mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFF]);

        let mut cfg = [0u8; CFG_FLASH_LEN];
        dev.read_flash(DeviceLayout::N76E003.cfg_addr, &mut cfg).unwrap();
        assert!(ConfigBytes::from_bytes(cfg).is_locked());
    }

    #[test]
    fn test_erase_of_locked_chip_needs_reentry() {
        let mut dev = DummyIcp::with_data(DummyConfig::locked(), &[0x12]);
        dev.init().unwrap();
        dev.mass_erase().unwrap();

        let mut buf = [0u8; 1];
        assert_eq!(dev.read_flash(0, &mut buf), Err(Error::NoResponse));
        assert_eq!(dev.read_device_id(), 0);

        dev.reentry(&ReentryTiming::default()).unwrap();
        dev.read_flash(0, &mut buf).unwrap();
        assert_eq!(buf, [0xFF]);
        assert_eq!(dev.config(), ConfigBytes::BLANK);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut dev = DummyIcp::new_default();
        dev.init().unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(
            dev.read_flash(18 * 1024 - 1, &mut buf),
            Err(Error::AddressOutOfBounds {
                addr: 18 * 1024 - 1,
                len: 2
            })
        );
    }
}
