//! Flash layout planning
//!
//! Splits the flash array between the application and loader regions and
//! derives the configuration bytes that select that split. Pure computation.

use core::fmt;

use crate::config::{BootSource, ConfigBytes};
use crate::device::{DeviceLayout, LDROM_BLOCK_SIZE};

/// How the flash is divided for one programming run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedLayout {
    /// Loader region size in KiB (0 when no loader is programmed)
    pub loader_size_kb: u8,
    /// Loader region size in bytes
    pub loader_size: usize,
    /// Bytes available to the application image
    pub application_capacity: usize,
    /// Configuration bytes to program
    pub config: ConfigBytes,
}

impl PlannedLayout {
    /// Start address of the loader region
    pub fn loader_addr(&self, layout: &DeviceLayout) -> u32 {
        layout.ldrom_addr(self.loader_size)
    }

    /// Whether a loader region is reserved
    pub fn has_loader(&self) -> bool {
        self.loader_size > 0
    }
}

/// Planning failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    /// Loader image does not fit the largest loader region
    LoaderTooLarge {
        /// Image length
        len: usize,
        /// Largest loader region
        max: usize,
    },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoaderTooLarge { len, max } => write!(
                f,
                "loader image of {} bytes exceeds the maximum of {} bytes",
                len, max
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PlanError {}

/// Plan a run with a loader image of `loader_len` bytes (0 for none)
pub fn plan(layout: &DeviceLayout, loader_len: usize) -> Result<PlannedLayout, PlanError> {
    plan_with_base(layout, loader_len, ConfigBytes::BLANK)
}

/// Plan a run starting from `base` configuration bytes
///
/// Loader size, boot source and lock are always derived here; every other
/// field of `base` is kept.
pub fn plan_with_base(
    layout: &DeviceLayout,
    loader_len: usize,
    base: ConfigBytes,
) -> Result<PlannedLayout, PlanError> {
    if loader_len > layout.ldrom_max_size {
        return Err(PlanError::LoaderTooLarge {
            len: loader_len,
            max: layout.ldrom_max_size,
        });
    }

    let mut config = base;
    config.set_locked(false);

    if loader_len == 0 {
        config.set_ldrom_size_kb(0);
        config.set_boot_source(BootSource::Aprom);
        return Ok(PlannedLayout {
            loader_size_kb: 0,
            loader_size: 0,
            application_capacity: layout.flash_size,
            config,
        });
    }

    let loader_size_kb = loader_len.div_ceil(LDROM_BLOCK_SIZE) as u8;
    let loader_size = loader_size_kb as usize * LDROM_BLOCK_SIZE;
    config.set_ldrom_size_kb(loader_size_kb);
    config.set_boot_source(BootSource::Ldrom);

    Ok(PlannedLayout {
        loader_size_kb,
        loader_size,
        application_capacity: layout.flash_size - loader_size,
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrownOutVoltage, WdtMode};
    use crate::device::{FLASH_SIZE, LDROM_MAX_SIZE};

    const N76: DeviceLayout = DeviceLayout::N76E003;

    #[test]
    fn test_no_loader_is_blank() {
        let p = plan(&N76, 0).unwrap();
        assert_eq!(p.loader_size, 0);
        assert_eq!(p.loader_size_kb, 0);
        assert_eq!(p.application_capacity, FLASH_SIZE);
        assert_eq!(p.config, ConfigBytes::BLANK);
        assert!(!p.has_loader());
    }

    #[test]
    fn test_rounding_and_sum() {
        for len in 1..=LDROM_MAX_SIZE {
            let p = plan(&N76, len).unwrap();
            assert_eq!(p.loader_size % 1024, 0);
            assert!(p.loader_size >= len);
            assert!(p.loader_size - len < 1024, "not the smallest multiple for {}", len);
            assert_eq!(p.application_capacity + p.loader_size, FLASH_SIZE);
            assert_eq!(p.config.lds(), (7 - p.loader_size_kb) & 7);
            assert_eq!(p.config.ldrom_size(&N76), p.loader_size);
            assert_eq!(p.config.boot_source(), BootSource::Ldrom);
            assert!(!p.config.is_locked());
        }
    }

    #[test]
    fn test_boundary() {
        let p = plan(&N76, LDROM_MAX_SIZE).unwrap();
        assert_eq!(p.loader_size_kb, 4);
        assert_eq!(p.loader_size, LDROM_MAX_SIZE);
        assert_eq!(p.loader_addr(&N76), 0x3800);

        assert_eq!(
            plan(&N76, LDROM_MAX_SIZE + 1),
            Err(PlanError::LoaderTooLarge {
                len: LDROM_MAX_SIZE + 1,
                max: LDROM_MAX_SIZE
            })
        );
    }

    #[test]
    fn test_small_loader() {
        let p = plan(&N76, 1).unwrap();
        assert_eq!(p.loader_size_kb, 1);
        assert_eq!(p.config.as_bytes()[0], 0x7F);
        assert_eq!(p.config.as_bytes()[1], 0xFE);
        assert_eq!(p.loader_addr(&N76), 0x4400);
    }

    #[test]
    fn test_base_keeps_other_fields() {
        let mut base = ConfigBytes::BLANK;
        base.set_reset_pin_enabled(false);
        base.set_brown_out_voltage(BrownOutVoltage::V2_7);
        base.set_wdt_mode(WdtMode::StopInIdle);
        // Layout fields and lock in the base are overridden
        base.set_locked(true);
        base.set_boot_source(BootSource::Ldrom);
        base.set_ldrom_size_kb(3);

        let p = plan_with_base(&N76, 2000, base).unwrap();
        assert!(!p.config.is_locked());
        assert_eq!(p.config.boot_source(), BootSource::Ldrom);
        assert_eq!(p.loader_size_kb, 2);
        assert_eq!(p.config.ldrom_size(&N76), 2048);
        assert!(!p.config.reset_pin_enabled());
        assert_eq!(p.config.brown_out_voltage(), BrownOutVoltage::V2_7);
        assert_eq!(p.config.wdt_mode(), WdtMode::StopInIdle);

        let p = plan_with_base(&N76, 0, base).unwrap();
        assert_eq!(p.config.boot_source(), BootSource::Aprom);
        assert_eq!(p.config.lds(), 7);
        assert!(!p.config.is_locked());
    }
}
