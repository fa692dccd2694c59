//! TOML configuration file support
//!
//! Configuration bytes can be saved to and loaded from a human readable file:
//!
//! ```toml
//! [config]
//! raw = "FF FF FF FF FF"
//! boot = "aprom"
//! locked = false
//! ldrom_size_kb = 0
//! reset_pin = true
//! ocd = false
//! ocd_pwm_tristate = true
//! brown_out_detect = true
//! brown_out_voltage = "2.2V"
//! brown_out_reset = true
//! brown_out_inhibit_iap = true
//! wdt = "disabled"
//! ```
//!
//! Every field is optional. `raw` seeds the value (blank if absent) and the
//! named fields are applied on top of it, so undocumented bits survive a
//! save/load cycle.

use std::format;
use std::fs;
use std::path::Path;
use std::string::{String, ToString};
use std::vec::Vec;

use super::{BootSource, BrownOutVoltage, ConfigBytes, WdtMode};
use crate::device::{DeviceLayout, CFG_FLASH_LEN, LDROM_BLOCK_SIZE};

/// Errors from loading or saving a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// File could not be read or written
    #[error("config file I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid TOML or has unknown fields
    #[error("failed to parse config file: {0}")]
    Parse(#[from] ::toml::de::Error),
    /// File could not be serialized
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] ::toml::ser::Error),
    /// A field has a value outside its domain
    #[error("invalid value for '{field}': {value}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Offending value
        value: String,
    },
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfigFile {
    config: TomlConfig,
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    boot: Option<TomlBoot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ldrom_size_kb: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_pin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ocd: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ocd_pwm_tristate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brown_out_detect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brown_out_voltage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brown_out_reset: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brown_out_inhibit_iap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wdt: Option<TomlWdt>,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
enum TomlBoot {
    Aprom,
    Ldrom,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
enum TomlWdt {
    Disabled,
    StopInIdle,
    AlwaysOn,
}

fn parse_raw(s: &str) -> Result<[u8; CFG_FLASH_LEN], ConfigFileError> {
    let invalid = || ConfigFileError::InvalidValue {
        field: "raw",
        value: s.to_string(),
    };
    let bytes: Vec<u8> = s
        .split_whitespace()
        .map(|b| u8::from_str_radix(b.trim_start_matches("0x"), 16))
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}

fn parse_voltage(s: &str) -> Result<BrownOutVoltage, ConfigFileError> {
    match s.trim().trim_end_matches(['V', 'v']) {
        "2.2" => Ok(BrownOutVoltage::V2_2),
        "2.7" => Ok(BrownOutVoltage::V2_7),
        "3.7" => Ok(BrownOutVoltage::V3_7),
        "4.4" => Ok(BrownOutVoltage::V4_4),
        _ => Err(ConfigFileError::InvalidValue {
            field: "brown_out_voltage",
            value: s.to_string(),
        }),
    }
}

impl ConfigBytes {
    /// Load configuration bytes from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration bytes from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigFileError> {
        let file: TomlConfigFile = ::toml::from_str(content)?;
        let t = file.config;

        let mut config = match &t.raw {
            Some(raw) => ConfigBytes::from_bytes(parse_raw(raw)?),
            None => ConfigBytes::BLANK,
        };

        if let Some(boot) = t.boot {
            config.set_boot_source(match boot {
                TomlBoot::Aprom => BootSource::Aprom,
                TomlBoot::Ldrom => BootSource::Ldrom,
            });
        }
        if let Some(locked) = t.locked {
            config.set_locked(locked);
        }
        if let Some(kb) = t.ldrom_size_kb {
            if kb as usize * LDROM_BLOCK_SIZE > DeviceLayout::N76E003.ldrom_max_size {
                return Err(ConfigFileError::InvalidValue {
                    field: "ldrom_size_kb",
                    value: kb.to_string(),
                });
            }
            // LDS values 0..=3 all decode to the maximum, keep the raw one
            if config.ldrom_size(&DeviceLayout::N76E003) != kb as usize * LDROM_BLOCK_SIZE {
                config.set_ldrom_size_kb(kb);
            }
        }
        if let Some(v) = t.reset_pin {
            config.set_reset_pin_enabled(v);
        }
        if let Some(v) = t.ocd {
            config.set_ocd_enabled(v);
        }
        if let Some(v) = t.ocd_pwm_tristate {
            config.set_ocd_pwm_tristate(v);
        }
        if let Some(v) = t.brown_out_detect {
            config.set_brown_out_detect(v);
        }
        if let Some(v) = &t.brown_out_voltage {
            config.set_brown_out_voltage(parse_voltage(v)?);
        }
        if let Some(v) = t.brown_out_reset {
            config.set_brown_out_reset(v);
        }
        if let Some(v) = t.brown_out_inhibit_iap {
            config.set_brown_out_inhibits_iap(v);
        }
        if let Some(wdt) = t.wdt {
            let mode = match wdt {
                TomlWdt::Disabled => WdtMode::Disabled,
                TomlWdt::StopInIdle => WdtMode::StopInIdle,
                TomlWdt::AlwaysOn => WdtMode::AlwaysOn,
            };
            if config.wdt_mode() != mode {
                config.set_wdt_mode(mode);
            }
        }

        Ok(config)
    }

    /// Save configuration bytes to a TOML file
    pub fn to_toml_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigFileError> {
        let content = self.to_toml_string()?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Convert configuration bytes to a TOML string with every field spelled out
    pub fn to_toml_string(&self) -> Result<String, ConfigFileError> {
        let layout = DeviceLayout::N76E003;
        let raw: Vec<String> = self.as_bytes().iter().map(|b| format!("{:02X}", b)).collect();
        let file = TomlConfigFile {
            config: TomlConfig {
                raw: Some(raw.join(" ")),
                boot: Some(match self.boot_source() {
                    BootSource::Aprom => TomlBoot::Aprom,
                    BootSource::Ldrom => TomlBoot::Ldrom,
                }),
                locked: Some(self.is_locked()),
                ldrom_size_kb: Some((self.ldrom_size(&layout) / LDROM_BLOCK_SIZE) as u8),
                reset_pin: Some(self.reset_pin_enabled()),
                ocd: Some(self.ocd_enabled()),
                ocd_pwm_tristate: Some(self.ocd_pwm_tristate()),
                brown_out_detect: Some(self.brown_out_detect()),
                brown_out_voltage: Some(self.brown_out_voltage().to_string()),
                brown_out_reset: Some(self.brown_out_reset()),
                brown_out_inhibit_iap: Some(self.brown_out_inhibits_iap()),
                wdt: Some(match self.wdt_mode() {
                    WdtMode::Disabled => TomlWdt::Disabled,
                    WdtMode::StopInIdle => TomlWdt::StopInIdle,
                    WdtMode::AlwaysOn => TomlWdt::AlwaysOn,
                }),
            },
        };
        Ok(::toml::to_string(&file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields() {
        let toml = r#"
[config]
boot = "ldrom"
ldrom_size_kb = 2
reset_pin = false
brown_out_voltage = "3.7V"
wdt = "stop-in-idle"
"#;
        let c = ConfigBytes::from_toml_str(toml).unwrap();
        assert_eq!(c.boot_source(), BootSource::Ldrom);
        assert_eq!(c.lds(), 5);
        assert!(!c.reset_pin_enabled());
        assert_eq!(c.brown_out_voltage(), BrownOutVoltage::V3_7);
        assert_eq!(c.wdt_mode(), WdtMode::StopInIdle);
        assert!(!c.is_locked());
    }

    #[test]
    fn test_empty_table_is_blank() {
        let c = ConfigBytes::from_toml_str("[config]\n").unwrap();
        assert_eq!(c, ConfigBytes::BLANK);
    }

    #[test]
    fn test_save_load_preserves_bytes() {
        // Undocumented bits in CONFIG1 and CONFIG3 must survive via `raw`
        let original = ConfigBytes::from_bytes([0x6D, 0xF5, 0x9B, 0x12, 0x5F]);
        let text = original.to_toml_string().unwrap();
        assert!(text.contains("raw = \"6D F5 9B 12 5F\""));
        let loaded = ConfigBytes::from_toml_str(&text).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ConfigBytes::from_toml_str("[config]\nbrown_out_voltage = \"5V\"\n"),
            Err(ConfigFileError::InvalidValue { field: "brown_out_voltage", .. })
        ));
        assert!(matches!(
            ConfigBytes::from_toml_str("[config]\nldrom_size_kb = 5\n"),
            Err(ConfigFileError::InvalidValue { field: "ldrom_size_kb", .. })
        ));
        assert!(matches!(
            ConfigBytes::from_toml_str("[config]\nraw = \"FF FF\"\n"),
            Err(ConfigFileError::InvalidValue { field: "raw", .. })
        ));
        assert!(ConfigBytes::from_toml_str("[config]\nbogus = 1\n").is_err());
    }
}
