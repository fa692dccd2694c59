//! Linux GPIO ICP pin driver
//!
//! This module provides the `LinuxGpioPgm` struct that implements the
//! `PgmPins` trait using Linux's GPIO character device interface (gpiocdev).
//! The ICP bit protocol itself lives in `nuvoicp_core::icp::bitbang`.
//!
//! CLK and RST are always outputs. DAT is switched between output and input
//! as the protocol turns the line around.

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use nuvoicp_core::error::{Error as CoreError, Result as CoreResult};
use nuvoicp_core::icp::bitbang::{PgmPins, DEFAULT_BIT_DELAY_US};

/// Default CLK line (Raspberry Pi header pin 37)
pub const DEFAULT_CLK: Offset = 26;
/// Default DAT line (Raspberry Pi header pin 38)
pub const DEFAULT_DAT: Offset = 20;
/// Default RST line (Raspberry Pi header pin 40)
pub const DEFAULT_RST: Offset = 21;

/// Configuration for opening the ICP lines
#[derive(Debug, Clone)]
pub struct LinuxGpioPgmConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// CLK GPIO line offset
    pub clk: Offset,
    /// DAT GPIO line offset
    pub dat: Offset,
    /// RST GPIO line offset
    pub rst: Offset,
    /// DAT/CLK half-period in microseconds
    pub bit_delay_us: u32,
}

impl Default for LinuxGpioPgmConfig {
    fn default() -> Self {
        Self {
            device: "/dev/gpiochip0".to_string(),
            clk: DEFAULT_CLK,
            dat: DEFAULT_DAT,
            rst: DEFAULT_RST,
            bit_delay_us: DEFAULT_BIT_DELAY_US,
        }
    }
}

impl LinuxGpioPgmConfig {
    /// Create a new configuration with the given device path and lines
    pub fn new(device: impl Into<String>, clk: Offset, dat: Offset, rst: Offset) -> Self {
        Self {
            device: device.into(),
            clk,
            dat,
            rst,
            ..Default::default()
        }
    }

    /// Set the bit delay in microseconds
    pub fn with_bit_delay_us(mut self, us: u32) -> Self {
        self.bit_delay_us = us;
        self
    }

    fn check_lines(&self) -> Result<()> {
        let lines = [("clk", self.clk), ("dat", self.dat), ("rst", self.rst)];
        for (i, &(first, a)) in lines.iter().enumerate() {
            for &(second, b) in &lines[i + 1..] {
                if a == b {
                    return Err(LinuxGpioError::DuplicateLine {
                        first,
                        second,
                        line: a,
                    });
                }
            }
        }
        Ok(())
    }
}

fn level(high: bool) -> Value {
    if high {
        Value::Active
    } else {
        Value::Inactive
    }
}

/// ICP programmer pins on Linux GPIO
///
/// The requested lines are released when this is dropped.
pub struct LinuxGpioPgm {
    /// GPIO line request handle
    request: Request,
    clk: Offset,
    dat: Offset,
    rst: Offset,
    /// Last driven levels, kept so a reconfiguration does not glitch them
    clk_high: bool,
    dat_high: bool,
    rst_high: bool,
    dat_output: bool,
}

impl LinuxGpioPgm {
    /// Request the ICP lines described by `config`
    pub fn open(config: &LinuxGpioPgmConfig) -> Result<Self> {
        config.check_lines()?;

        log::debug!("linux_gpio: Opening device {}", config.device);

        // Initial state: CLK=0, RST=0, DAT=input
        let mut req_config = Config::default();
        req_config.with_line(config.clk).as_output(Value::Inactive);
        req_config.with_line(config.rst).as_output(Value::Inactive);
        req_config.with_line(config.dat).as_input();

        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer("nuvoicp")
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                path: config.device.clone(),
                source,
            })?;

        log::info!(
            "linux_gpio: Opened {} (clk={}, dat={}, rst={})",
            config.device,
            config.clk,
            config.dat,
            config.rst
        );

        Ok(Self {
            request,
            clk: config.clk,
            dat: config.dat,
            rst: config.rst,
            clk_high: false,
            dat_high: false,
            rst_high: false,
            dat_output: false,
        })
    }

    fn reconfigure(&mut self) -> Result<()> {
        let mut cfg = Config::default();
        cfg.with_line(self.clk).as_output(level(self.clk_high));
        cfg.with_line(self.rst).as_output(level(self.rst_high));
        if self.dat_output {
            cfg.with_line(self.dat).as_output(level(self.dat_high));
        } else {
            cfg.with_line(self.dat).as_input();
        }
        self.request
            .reconfigure(&cfg)
            .map_err(LinuxGpioError::ReconfigureFailed)?;
        Ok(())
    }

    fn set_line(&mut self, offset: Offset, high: bool, name: &str) {
        if let Err(e) = self.request.set_value(offset, level(high)) {
            log::error!("Failed to set {}: {}", name, e);
        }
    }
}

impl PgmPins for LinuxGpioPgm {
    fn init(&mut self) -> CoreResult<()> {
        self.clk_high = false;
        self.rst_high = false;
        self.dat_output = false;
        self.reconfigure().map_err(|e| {
            log::error!("linux_gpio: {}", e);
            CoreError::InitFailed
        })
    }

    fn deinit(&mut self, leave_reset_high: bool) {
        // Release DAT and CLK to high-z, RST too unless asked to hold it
        let mut cfg = Config::default();
        cfg.with_line(self.clk).as_input();
        cfg.with_line(self.dat).as_input();
        if leave_reset_high {
            cfg.with_line(self.rst).as_output(Value::Active);
        } else {
            cfg.with_line(self.rst).as_input();
        }
        if let Err(e) = self.request.reconfigure(&cfg) {
            log::error!("Failed to release ICP lines: {}", e);
        }
        self.dat_output = false;
    }

    fn set_dat(&mut self, high: bool) {
        self.dat_high = high;
        if self.dat_output {
            self.set_line(self.dat, high, "DAT");
        }
    }

    fn get_dat(&mut self) -> bool {
        match self.request.value(self.dat) {
            Ok(Value::Active) => true,
            Ok(Value::Inactive) => false,
            Err(e) => {
                log::error!("Failed to get DAT: {}", e);
                false
            }
        }
    }

    fn set_rst(&mut self, high: bool) {
        self.rst_high = high;
        self.set_line(self.rst, high, "RST");
    }

    fn set_clk(&mut self, high: bool) {
        self.clk_high = high;
        self.set_line(self.clk, high, "CLK");
    }

    fn set_dat_dir(&mut self, output: bool) {
        if self.dat_output == output {
            return;
        }
        self.dat_output = output;
        if let Err(e) = self.reconfigure() {
            log::error!("Failed to switch DAT direction: {}", e);
        }
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

fn parse_line(name: &'static str, value: &str) -> Result<Offset> {
    value
        .parse()
        .map_err(|_| LinuxGpioError::InvalidLineNumber {
            name,
            value: value.to_string(),
        })
}

/// Parse programmer options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path
/// - `gpiochip=N` - GPIO chip number (alternative to dev, default 0)
/// - `clk=N` - CLK GPIO line offset (default 26)
/// - `dat=N` - DAT GPIO line offset (default 20)
/// - `rst=N` - RST GPIO line offset (default 21)
/// - `bitdelay=N` - DAT/CLK half-period in microseconds (default 2)
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxGpioPgmConfig> {
    let mut config = LinuxGpioPgmConfig::default();
    let mut dev: Option<String> = None;
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        match *key {
            "dev" => {
                dev = Some(value.to_string());
            }
            "gpiochip" => {
                gpiochip = Some(value.parse().map_err(|_| {
                    LinuxGpioError::InvalidParameter(format!("Invalid gpiochip value: {}", value))
                })?);
            }
            "clk" => config.clk = parse_line("clk", value)?,
            "dat" => config.dat = parse_line("dat", value)?,
            "rst" => config.rst = parse_line("rst", value)?,
            "bitdelay" => {
                config.bit_delay_us = value.parse().map_err(|_| {
                    LinuxGpioError::InvalidParameter(format!("Invalid bitdelay value: {}", value))
                })?;
            }
            _ => {
                log::warn!("linux_gpio: Unknown option: {}={}", key, value);
            }
        }
    }

    // Handle dev vs gpiochip
    match (dev, gpiochip) {
        (Some(_), Some(_)) => return Err(LinuxGpioError::ConflictingDevice),
        (Some(path), None) => config.device = path,
        (None, Some(n)) => config.device = format!("/dev/gpiochip{}", n),
        (None, None) => {}
    }

    config.check_lines()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = parse_options(&[]).unwrap();
        assert_eq!(config.device, "/dev/gpiochip0");
        assert_eq!((config.clk, config.dat, config.rst), (26, 20, 21));
        assert_eq!(config.bit_delay_us, DEFAULT_BIT_DELAY_US);
    }

    #[test]
    fn test_parse_all() {
        let config = parse_options(&[
            ("gpiochip", "4"),
            ("clk", "3"),
            ("dat", "2"),
            ("rst", "17"),
            ("bitdelay", "10"),
        ])
        .unwrap();
        assert_eq!(config.device, "/dev/gpiochip4");
        assert_eq!((config.clk, config.dat, config.rst), (3, 2, 17));
        assert_eq!(config.bit_delay_us, 10);
    }

    #[test]
    fn test_dev_path() {
        let config = parse_options(&[("dev", "/dev/gpiochip2")]).unwrap();
        assert_eq!(config.device, "/dev/gpiochip2");
    }

    #[test]
    fn test_rejects_bad_options() {
        assert!(matches!(
            parse_options(&[("dev", "/dev/gpiochip0"), ("gpiochip", "0")]),
            Err(LinuxGpioError::ConflictingDevice)
        ));
        assert!(matches!(
            parse_options(&[("clk", "x")]),
            Err(LinuxGpioError::InvalidLineNumber { name: "clk", .. })
        ));
        assert!(matches!(
            parse_options(&[("clk", "20")]),
            Err(LinuxGpioError::DuplicateLine {
                first: "clk",
                second: "dat",
                line: 20
            })
        ));
        assert!(matches!(
            parse_options(&[("bitdelay", "-1")]),
            Err(LinuxGpioError::InvalidParameter(_))
        ));
    }
}
