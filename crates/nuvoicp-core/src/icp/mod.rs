//! ICP transport abstraction
//!
//! `IcpTransport` is the fixed capability interface the workflow drives. It
//! covers session entry/exit, the timed re-entry sequence, identity reads and
//! raw flash access. Implementations are blocking.
//!
//! Two kinds of implementation exist:
//! - **Bitbang** ([`bitbang::IcpBitbang`]) speaks the ICP bit protocol over any
//!   set of GPIO lines implementing [`bitbang::PgmPins`]
//! - **Emulated** (the `nuvoicp-dummy` crate) keeps an N76E003 in memory

pub mod bitbang;
pub mod commands;

use crate::config::ConfigBytes;
use crate::device::{DeviceLayout, CFG_FLASH_LEN, UCID_LEN, UID_LEN};
use crate::error::Result;

/// Default time reset is held high during re-entry, in microseconds
pub const DEFAULT_REENTRY_HOLD_US: u32 = 5000;
/// Default time after releasing reset before sending the entry bits
pub const DEFAULT_REENTRY_RELEASE_US: u32 = 1000;
/// Default number of re-entry attempts
pub const DEFAULT_REENTRY_ATTEMPTS: u32 = 10;

/// Timing of the re-entry sequence
///
/// Each attempt asserts reset for `hold_us`, releases it, waits `release_us`
/// and sends the ICP entry bits. A locked chip only answers read commands
/// after such a power-cycle-like sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReentryTiming {
    /// Reset assert time in microseconds
    pub hold_us: u32,
    /// Delay after reset release in microseconds
    pub release_us: u32,
    /// Maximum number of attempts
    pub max_attempts: u32,
}

impl Default for ReentryTiming {
    fn default() -> Self {
        Self {
            hold_us: DEFAULT_REENTRY_HOLD_US,
            release_us: DEFAULT_REENTRY_RELEASE_US,
            max_attempts: DEFAULT_REENTRY_ATTEMPTS,
        }
    }
}

/// ICP transport trait
///
/// Identity reads cannot fail at this level: an absent or locked device
/// simply returns all-zero or all-one values, which the workflow interprets.
pub trait IcpTransport {
    /// Initialize the programmer and enter ICP mode
    fn init(&mut self) -> Result<()>;

    /// Leave ICP mode and release the programmer
    ///
    /// Must be safe to call on a transport whose `init()` failed.
    fn shutdown(&mut self);

    /// Run the re-entry sequence until the device answers or attempts run out
    fn reentry(&mut self, timing: &ReentryTiming) -> Result<()>;

    /// Read the 16-bit device ID
    fn read_device_id(&mut self) -> u16;

    /// Read the company ID
    fn read_cid(&mut self) -> u8;

    /// Read the 12-byte unique ID
    fn read_uid(&mut self) -> [u8; UID_LEN];

    /// Read the 16-byte unique customer ID
    fn read_ucid(&mut self) -> [u8; UCID_LEN];

    /// Read `buf.len()` bytes of flash starting at `addr`
    fn read_flash(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Program `data` at `addr` (target must be erased)
    fn write_flash(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Erase the whole flash array, configuration bytes included
    fn mass_erase(&mut self) -> Result<()>;

    /// Log the configuration bytes found at `layout.cfg_addr` for diagnosis
    fn dump_config(&mut self, layout: &DeviceLayout) {
        let mut raw = [0u8; CFG_FLASH_LEN];
        match self.read_flash(layout.cfg_addr, &mut raw) {
            Ok(()) => {
                let config = ConfigBytes::from_bytes(raw);
                log::info!("{}", config.describe(layout));
            }
            Err(e) => log::error!("Failed to read configuration bytes: {}", e),
        }
    }
}

impl<T: IcpTransport + ?Sized> IcpTransport for alloc::boxed::Box<T> {
    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }

    fn reentry(&mut self, timing: &ReentryTiming) -> Result<()> {
        (**self).reentry(timing)
    }

    fn read_device_id(&mut self) -> u16 {
        (**self).read_device_id()
    }

    fn read_cid(&mut self) -> u8 {
        (**self).read_cid()
    }

    fn read_uid(&mut self) -> [u8; UID_LEN] {
        (**self).read_uid()
    }

    fn read_ucid(&mut self) -> [u8; UCID_LEN] {
        (**self).read_ucid()
    }

    fn read_flash(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read_flash(addr, buf)
    }

    fn write_flash(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        (**self).write_flash(addr, data)
    }

    fn mass_erase(&mut self) -> Result<()> {
        (**self).mass_erase()
    }

    fn dump_config(&mut self, layout: &DeviceLayout) {
        (**self).dump_config(layout)
    }
}
