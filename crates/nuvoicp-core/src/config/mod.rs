//! Configuration bytes
//!
//! The N76E003 keeps its boot, protection, brown-out and watchdog settings in
//! five bytes of flash at `CFG_FLASH_ADDR`. Most bits are active-high, but the
//! lock and OCD bits are inverted: an erased (all-ones) block means unlocked,
//! boot from APROM, no LDROM, OCD disabled.
//!
//! Layout (bit 0 is the LSB):
//!
//! | Byte | Bits | Field  | Meaning                                        |
//! |------|------|--------|------------------------------------------------|
//! | 0    | 1    | LOCK   | 1 = unlocked, 0 = flash read/write protected   |
//! | 0    | 2    | RPD    | 1 = P2.0/nRST acts as reset pin                |
//! | 0    | 4    | OCDEN  | 1 = on-chip debugger disabled                  |
//! | 0    | 5    | OCDPWM | 1 = PWM pins tri-stated on OCD halt            |
//! | 0    | 7    | CBS    | 1 = boot from APROM, 0 = boot from LDROM       |
//! | 1    | 0..2 | LDS    | LDROM size, `(7 - LDS)` KiB, capped at 4 KiB    |
//! | 2    | 2    | CBORST | 1 = brown-out reset enabled                    |
//! | 2    | 3    | BOIAP  | 1 = IAP inhibited below brown-out voltage      |
//! | 2    | 4..5 | CBOV   | brown-out voltage select                       |
//! | 2    | 7    | CBODEN | 1 = brown-out detection enabled                |
//! | 4    | 4..7 | WDTEN  | watchdog mode                                  |

#[cfg(feature = "std")]
mod toml;

#[cfg(feature = "std")]
pub use self::toml::ConfigFileError;

use crate::device::{DeviceLayout, CFG_FLASH_LEN, LDROM_BLOCK_SIZE};
use bitflags::bitflags;
use core::fmt;

bitflags! {
    /// CONFIG0 flag bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Config0: u8 {
        /// Flash unlocked (inverted lock bit)
        const LOCK   = 1 << 1;
        /// Reset pin enabled
        const RPD    = 1 << 2;
        /// On-chip debugger disabled (inverted)
        const OCDEN  = 1 << 4;
        /// PWM output tri-stated while OCD halts the core
        const OCDPWM = 1 << 5;
        /// Boot from APROM
        const CBS    = 1 << 7;
    }
}

bitflags! {
    /// CONFIG2 flag bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Config2: u8 {
        /// Brown-out reset enabled
        const CBORST = 1 << 2;
        /// IAP erase/program inhibited below the brown-out voltage
        const BOIAP  = 1 << 3;
        /// Brown-out detection enabled
        const CBODEN = 1 << 7;
    }
}

const LDS_MASK: u8 = 0x07;
const CBOV_SHIFT: u8 = 4;
const CBOV_MASK: u8 = 0x3 << CBOV_SHIFT;
const WDTEN_SHIFT: u8 = 4;
const WDTEN_MASK: u8 = 0xF << WDTEN_SHIFT;

/// Boot source selected by CBS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootSource {
    /// Boot from the application region
    Aprom,
    /// Boot from the loader region
    Ldrom,
}

impl fmt::Display for BootSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aprom => write!(f, "APROM"),
            Self::Ldrom => write!(f, "LDROM"),
        }
    }
}

/// Brown-out detection threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrownOutVoltage {
    /// 2.2V (CBOV = 11)
    V2_2,
    /// 2.7V (CBOV = 10)
    V2_7,
    /// 3.7V (CBOV = 01)
    V3_7,
    /// 4.4V (CBOV = 00)
    V4_4,
}

impl BrownOutVoltage {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            3 => Self::V2_2,
            2 => Self::V2_7,
            1 => Self::V3_7,
            _ => Self::V4_4,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Self::V2_2 => 3,
            Self::V2_7 => 2,
            Self::V3_7 => 1,
            Self::V4_4 => 0,
        }
    }
}

impl fmt::Display for BrownOutVoltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V2_2 => write!(f, "2.2V"),
            Self::V2_7 => write!(f, "2.7V"),
            Self::V3_7 => write!(f, "3.7V"),
            Self::V4_4 => write!(f, "4.4V"),
        }
    }
}

/// Watchdog timer mode selected by WDTEN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WdtMode {
    /// WDT disabled, usable as a general purpose timer (1111)
    Disabled,
    /// Time-out reset timer that stops in Idle/Power-down (0101)
    StopInIdle,
    /// Time-out reset timer that keeps running in Idle/Power-down (any other value)
    AlwaysOn,
}

impl WdtMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0xF {
            0xF => Self::Disabled,
            0x5 => Self::StopInIdle,
            _ => Self::AlwaysOn,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Self::Disabled => 0xF,
            Self::StopInIdle => 0x5,
            Self::AlwaysOn => 0x0,
        }
    }
}

impl fmt::Display for WdtMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(
                f,
                "WDT is Disabled. WDT can be used as a general purpose timer via software control."
            ),
            Self::StopInIdle => write!(
                f,
                "WDT is Enabled as a time-out reset timer and it STOPS running during Idle or Power-down mode."
            ),
            Self::AlwaysOn => write!(
                f,
                "WDT is Enabled as a time-out reset timer and it KEEPS running during Idle or Power-down mode."
            ),
        }
    }
}

/// The five configuration bytes, as stored in flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigBytes([u8; CFG_FLASH_LEN]);

impl Default for ConfigBytes {
    fn default() -> Self {
        Self::BLANK
    }
}

impl ConfigBytes {
    /// Erased configuration: unlocked, boot from APROM, no LDROM
    pub const BLANK: ConfigBytes = ConfigBytes([0xFF; CFG_FLASH_LEN]);

    /// Wrap raw configuration bytes
    pub const fn from_bytes(bytes: [u8; CFG_FLASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw configuration bytes
    pub const fn as_bytes(&self) -> &[u8; CFG_FLASH_LEN] {
        &self.0
    }

    /// CONFIG0 flags
    pub fn config0(&self) -> Config0 {
        Config0::from_bits_retain(self.0[0])
    }

    /// CONFIG2 flags
    pub fn config2(&self) -> Config2 {
        Config2::from_bits_retain(self.0[2])
    }

    fn set_config0(&mut self, flag: Config0, value: bool) {
        let mut c = self.config0();
        c.set(flag, value);
        self.0[0] = c.bits();
    }

    fn set_config2(&mut self, flag: Config2, value: bool) {
        let mut c = self.config2();
        c.set(flag, value);
        self.0[2] = c.bits();
    }

    /// Whether flash read/write protection is active
    pub fn is_locked(&self) -> bool {
        !self.config0().contains(Config0::LOCK)
    }

    /// Assert or release the flash lock
    pub fn set_locked(&mut self, locked: bool) {
        self.set_config0(Config0::LOCK, !locked);
    }

    /// Boot source after reset
    pub fn boot_source(&self) -> BootSource {
        if self.config0().contains(Config0::CBS) {
            BootSource::Aprom
        } else {
            BootSource::Ldrom
        }
    }

    /// Select the boot source
    pub fn set_boot_source(&mut self, source: BootSource) {
        self.set_config0(Config0::CBS, source == BootSource::Aprom);
    }

    /// Whether P2.0/nRST acts as reset pin
    pub fn reset_pin_enabled(&self) -> bool {
        self.config0().contains(Config0::RPD)
    }

    /// Enable or disable the reset function of P2.0/nRST
    pub fn set_reset_pin_enabled(&mut self, enabled: bool) {
        self.set_config0(Config0::RPD, enabled);
    }

    /// Whether the on-chip debugger is enabled
    pub fn ocd_enabled(&self) -> bool {
        !self.config0().contains(Config0::OCDEN)
    }

    /// Enable or disable the on-chip debugger
    pub fn set_ocd_enabled(&mut self, enabled: bool) {
        self.set_config0(Config0::OCDEN, !enabled);
    }

    /// Whether PWM pins are tri-stated while OCD halts the core
    pub fn ocd_pwm_tristate(&self) -> bool {
        self.config0().contains(Config0::OCDPWM)
    }

    /// Select PWM behavior under OCD halt
    pub fn set_ocd_pwm_tristate(&mut self, tristate: bool) {
        self.set_config0(Config0::OCDPWM, tristate);
    }

    /// Raw LDROM size select field
    pub fn lds(&self) -> u8 {
        self.0[1] & LDS_MASK
    }

    /// Set the raw LDROM size select field
    pub fn set_lds(&mut self, lds: u8) {
        self.0[1] = (self.0[1] & !LDS_MASK) | (lds & LDS_MASK);
    }

    /// Encode an LDROM size in KiB into LDS
    pub fn set_ldrom_size_kb(&mut self, kb: u8) {
        self.set_lds(7u8.wrapping_sub(kb) & LDS_MASK);
    }

    /// LDROM size in bytes selected by LDS, capped at the layout maximum
    pub fn ldrom_size(&self, layout: &DeviceLayout) -> usize {
        let kb = (7 - self.lds()) as usize;
        (kb * LDROM_BLOCK_SIZE).min(layout.ldrom_max_size)
    }

    /// APROM size in bytes left over by the selected LDROM size
    pub fn aprom_size(&self, layout: &DeviceLayout) -> usize {
        layout.flash_size - self.ldrom_size(layout)
    }

    /// Whether brown-out detection is enabled
    pub fn brown_out_detect(&self) -> bool {
        self.config2().contains(Config2::CBODEN)
    }

    /// Enable or disable brown-out detection
    pub fn set_brown_out_detect(&mut self, enabled: bool) {
        self.set_config2(Config2::CBODEN, enabled);
    }

    /// Whether brown-out resets the chip
    pub fn brown_out_reset(&self) -> bool {
        self.config2().contains(Config2::CBORST)
    }

    /// Enable or disable brown-out reset
    pub fn set_brown_out_reset(&mut self, enabled: bool) {
        self.set_config2(Config2::CBORST, enabled);
    }

    /// Whether IAP is inhibited below the brown-out voltage
    pub fn brown_out_inhibits_iap(&self) -> bool {
        self.config2().contains(Config2::BOIAP)
    }

    /// Select whether IAP is inhibited below the brown-out voltage
    pub fn set_brown_out_inhibits_iap(&mut self, inhibit: bool) {
        self.set_config2(Config2::BOIAP, inhibit);
    }

    /// Brown-out threshold
    pub fn brown_out_voltage(&self) -> BrownOutVoltage {
        BrownOutVoltage::from_bits((self.0[2] & CBOV_MASK) >> CBOV_SHIFT)
    }

    /// Select the brown-out threshold
    pub fn set_brown_out_voltage(&mut self, voltage: BrownOutVoltage) {
        self.0[2] = (self.0[2] & !CBOV_MASK) | (voltage.bits() << CBOV_SHIFT);
    }

    /// Watchdog mode
    pub fn wdt_mode(&self) -> WdtMode {
        WdtMode::from_bits((self.0[4] & WDTEN_MASK) >> WDTEN_SHIFT)
    }

    /// Select the watchdog mode
    pub fn set_wdt_mode(&mut self, mode: WdtMode) {
        self.0[4] = (self.0[4] & !WDTEN_MASK) | (mode.bits() << WDTEN_SHIFT);
    }

    /// Decoded view for display against a specific layout
    pub fn describe<'a>(&'a self, layout: &'a DeviceLayout) -> ConfigDescription<'a> {
        ConfigDescription {
            config: self,
            layout,
        }
    }
}

/// Multi-line human readable dump of a configuration
pub struct ConfigDescription<'a> {
    config: &'a ConfigBytes,
    layout: &'a DeviceLayout,
}

impl fmt::Display for ConfigDescription<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.config;
        writeln!(f, "----- Chip Configuration ----")?;
        write!(f, "Raw config bytes:\t")?;
        for b in c.as_bytes() {
            write!(f, "{:02X} ", b)?;
        }
        writeln!(f)?;
        writeln!(f, "MCU Boot select:\t{}", c.boot_source())?;
        writeln!(f, "LDROM size:\t\t{} Bytes", c.ldrom_size(self.layout))?;
        writeln!(f, "APROM size:\t\t{} Bytes", c.aprom_size(self.layout))?;
        writeln!(
            f,
            "Security lock:\t\t{}",
            if c.is_locked() { "LOCKED" } else { "UNLOCKED" }
        )?;
        writeln!(
            f,
            "P2.0/Nrst reset:\t{}",
            if c.reset_pin_enabled() { "enabled" } else { "disabled" }
        )?;
        writeln!(
            f,
            "On-Chip Debugger:\t{}",
            if c.ocd_enabled() { "enabled" } else { "disabled" }
        )?;
        writeln!(
            f,
            "OCD halt PWM output:\t{}",
            if c.ocd_pwm_tristate() {
                "tri-state pins are used as PWM outputs"
            } else {
                "PWM continues"
            }
        )?;
        writeln!(
            f,
            "Brown-out detect:\t{}",
            if c.brown_out_detect() { "enabled" } else { "disabled" }
        )?;
        writeln!(f, "Brown-out voltage:\t{}", c.brown_out_voltage())?;
        writeln!(
            f,
            "Brown-out reset:\t{}",
            if c.brown_out_reset() { "enabled" } else { "disabled" }
        )?;
        write!(f, "WDT status:\t\t{}", c.wdt_mode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_config() {
        let c = ConfigBytes::BLANK;
        let layout = DeviceLayout::N76E003;
        assert!(!c.is_locked());
        assert_eq!(c.boot_source(), BootSource::Aprom);
        assert_eq!(c.lds(), 7);
        assert_eq!(c.ldrom_size(&layout), 0);
        assert_eq!(c.aprom_size(&layout), 18 * 1024);
        assert!(!c.ocd_enabled());
        assert_eq!(c.wdt_mode(), WdtMode::Disabled);
        assert_eq!(c.brown_out_voltage(), BrownOutVoltage::V2_2);
    }

    #[test]
    fn test_lock_bit_is_inverted() {
        let mut c = ConfigBytes::BLANK;
        c.set_locked(true);
        assert_eq!(c.as_bytes()[0], 0xFD);
        assert!(c.is_locked());
        c.set_locked(false);
        assert_eq!(c, ConfigBytes::BLANK);
    }

    #[test]
    fn test_boot_source_bit() {
        let mut c = ConfigBytes::BLANK;
        c.set_boot_source(BootSource::Ldrom);
        assert_eq!(c.as_bytes()[0], 0x7F);
        assert_eq!(c.boot_source(), BootSource::Ldrom);
    }

    #[test]
    fn test_ldrom_size_encoding() {
        let layout = DeviceLayout::N76E003;
        let mut c = ConfigBytes::BLANK;

        c.set_ldrom_size_kb(1);
        assert_eq!(c.lds(), 6);
        assert_eq!(c.as_bytes()[1], 0xFE);
        assert_eq!(c.ldrom_size(&layout), 1024);

        c.set_ldrom_size_kb(4);
        assert_eq!(c.lds(), 3);
        assert_eq!(c.ldrom_size(&layout), 4096);
        assert_eq!(c.aprom_size(&layout), 14 * 1024);

        // LDS values below 3 still select the 4 KiB maximum
        c.set_lds(0);
        assert_eq!(c.ldrom_size(&layout), 4096);
        // Upper bits of CONFIG1 are untouched
        assert_eq!(c.as_bytes()[1] & !LDS_MASK, 0xF8);
    }

    #[test]
    fn test_config2_fields() {
        let mut c = ConfigBytes::from_bytes([0xFF, 0xFF, 0x00, 0xFF, 0xFF]);
        assert!(!c.brown_out_detect());
        assert!(!c.brown_out_reset());
        assert_eq!(c.brown_out_voltage(), BrownOutVoltage::V4_4);

        c.set_brown_out_voltage(BrownOutVoltage::V2_7);
        c.set_brown_out_detect(true);
        assert_eq!(c.as_bytes()[2], 0xA0);
        assert_eq!(c.brown_out_voltage(), BrownOutVoltage::V2_7);
    }

    #[test]
    fn test_wdt_modes() {
        let mut c = ConfigBytes::BLANK;
        c.set_wdt_mode(WdtMode::StopInIdle);
        assert_eq!(c.as_bytes()[4], 0x5F);
        assert_eq!(c.wdt_mode(), WdtMode::StopInIdle);
        c.set_wdt_mode(WdtMode::AlwaysOn);
        assert_eq!(c.as_bytes()[4], 0x0F);
        assert_eq!(c.wdt_mode(), WdtMode::AlwaysOn);
    }
}
