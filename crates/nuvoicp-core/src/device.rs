//! Device constants and identity
//!
//! The N76E003 exposes one physically contiguous 18 KiB flash array. The
//! application region (APROM) starts at 0 and the optional loader region
//! (LDROM) is carved from the top. The configuration bytes live in a separate
//! address space at 0x30000.

use core::fmt;

/// N76E003 device ID as reported by the ICP read-device-id command
pub const N76E003_DEVID: u16 = 0x3650;
/// Start of the application region
pub const APROM_FLASH_ADDR: u32 = 0x0;
/// Address of the configuration bytes
pub const CFG_FLASH_ADDR: u32 = 0x30000;
/// Number of configuration bytes
pub const CFG_FLASH_LEN: usize = 5;
/// Largest loader region the configuration can select
pub const LDROM_MAX_SIZE: usize = 4 * 1024;
/// Total size of the flash array (APROM + LDROM)
pub const FLASH_SIZE: usize = 18 * 1024;
/// Loader region size granularity
pub const LDROM_BLOCK_SIZE: usize = 1024;

/// Company ID reported by a chip whose flash is read-protected
pub const LOCKED_CID: u8 = 0xFF;
/// Value of an erased flash byte
pub const ERASED_BYTE: u8 = 0xFF;

/// Length of the unique ID
pub const UID_LEN: usize = 12;
/// Length of the unique customer ID
pub const UCID_LEN: usize = 16;

/// Flash geometry and identity of a supported device
///
/// The workflow is parameterised by this value rather than by the bare
/// constants so that the planner and sequencer can be exercised against
/// other geometries of the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLayout {
    /// Human readable model name
    pub name: &'static str,
    /// Expected device ID
    pub device_id: u16,
    /// Total flash size in bytes
    pub flash_size: usize,
    /// Largest loader region in bytes
    pub ldrom_max_size: usize,
    /// Application region start address
    pub aprom_addr: u32,
    /// Configuration bytes address
    pub cfg_addr: u32,
}

impl DeviceLayout {
    /// Nuvoton N76E003
    pub const N76E003: DeviceLayout = DeviceLayout {
        name: "N76E003",
        device_id: N76E003_DEVID,
        flash_size: FLASH_SIZE,
        ldrom_max_size: LDROM_MAX_SIZE,
        aprom_addr: APROM_FLASH_ADDR,
        cfg_addr: CFG_FLASH_ADDR,
    };

    /// Address of a loader region of `loader_size` bytes
    pub const fn ldrom_addr(&self, loader_size: usize) -> u32 {
        self.aprom_addr + (self.flash_size - loader_size) as u32
    }

    /// Look up the model name for a device ID
    pub fn model_name(&self, device_id: u16) -> &'static str {
        if device_id == self.device_id {
            self.name
        } else {
            "unknown"
        }
    }
}

impl Default for DeviceLayout {
    fn default() -> Self {
        Self::N76E003
    }
}

/// Identity registers read over ICP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Device ID
    pub device_id: u16,
    /// Company ID (0xFF when the chip is locked)
    pub company_id: u8,
    /// Unique ID
    pub uid: [u8; UID_LEN],
    /// Unique customer ID
    pub ucid: [u8; UCID_LEN],
}

impl DeviceIdentity {
    /// Whether the company ID carries the locked-chip sentinel
    pub fn is_locked_sentinel(&self) -> bool {
        self.company_id == LOCKED_CID
    }

    /// Whether this is the device described by `layout`
    pub fn matches(&self, layout: &DeviceLayout) -> bool {
        self.device_id == layout.device_id
    }
}

impl DeviceIdentity {
    /// Human readable dump naming the model against `layout`
    pub fn describe<'a>(&'a self, layout: &'a DeviceLayout) -> IdentityDescription<'a> {
        IdentityDescription {
            identity: self,
            layout,
        }
    }
}

/// Multi-line dump of a device identity
pub struct IdentityDescription<'a> {
    identity: &'a DeviceIdentity,
    layout: &'a DeviceLayout,
}

impl fmt::Display for IdentityDescription<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.identity;
        writeln!(
            f,
            "Device ID:\t0x{:04x} ({})",
            id.device_id,
            self.layout.model_name(id.device_id)
        )?;
        writeln!(f, "CID:\t\t0x{:02x}", id.company_id)?;
        write!(f, "UID:\t\t")?;
        for b in &id.uid {
            write!(f, "{:02x} ", b)?;
        }
        writeln!(f)?;
        write!(f, "UCID:\t\t")?;
        for b in &id.ucid {
            write!(f, "{:02x} ", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ldrom_addr() {
        let layout = DeviceLayout::N76E003;
        assert_eq!(layout.ldrom_addr(0), FLASH_SIZE as u32);
        assert_eq!(layout.ldrom_addr(4096), 0x3800);
    }

    #[test]
    fn test_describe_uses_layout() {
        let id = DeviceIdentity {
            device_id: 0x2F00,
            company_id: 0xDA,
            uid: [0; UID_LEN],
            ucid: [0; UCID_LEN],
        };
        let other = DeviceLayout {
            name: "N76E616",
            device_id: 0x2F00,
            ..DeviceLayout::N76E003
        };
        let text = alloc::format!("{}", id.describe(&other));
        assert!(text.starts_with("Device ID:\t0x2f00 (N76E616)"));
        let text = alloc::format!("{}", id.describe(&DeviceLayout::N76E003));
        assert!(text.starts_with("Device ID:\t0x2f00 (unknown)"));
    }

    #[test]
    fn test_locked_sentinel() {
        let mut id = DeviceIdentity {
            device_id: N76E003_DEVID,
            company_id: 0xDA,
            uid: [0; UID_LEN],
            ucid: [0; UCID_LEN],
        };
        assert!(!id.is_locked_sentinel());
        assert!(id.matches(&DeviceLayout::N76E003));

        id.company_id = LOCKED_CID;
        id.device_id = 0xFFFF;
        assert!(id.is_locked_sentinel());
        assert!(!id.matches(&DeviceLayout::N76E003));
    }
}
