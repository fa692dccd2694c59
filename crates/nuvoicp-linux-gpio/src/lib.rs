//! nuvoicp-linux-gpio - Linux GPIO bitbang ICP support
//!
//! This crate drives the N76E003 ICP interface from three GPIO lines using
//! the Linux character device GPIO interface (gpiocdev). The pins are
//! wrapped in `nuvoicp_core::icp::bitbang::IcpBitbang`, which speaks the
//! ICP bit protocol.
//!
//! # Example
//!
//! ```no_run
//! use nuvoicp_linux_gpio::{LinuxGpioPgm, LinuxGpioPgmConfig};
//! use nuvoicp_core::icp::bitbang::IcpBitbang;
//! use nuvoicp_core::icp::IcpTransport;
//!
//! let config = LinuxGpioPgmConfig::new("/dev/gpiochip0", 26, 20, 21);
//! //                                     device          CLK DAT RST
//!
//! let mut icp = IcpBitbang::new(LinuxGpioPgm::open(&config)?);
//! icp.init()?;
//! println!("Device ID: {:04X}", icp.read_device_id());
//! icp.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with nuvoicp CLI
//!
//! ```bash
//! # Raspberry Pi defaults (gpiochip0, CLK=26, DAT=20, RST=21)
//! nuvoicp status -p linux_gpio
//!
//! # Other lines and a slower bit clock
//! nuvoicp write -p linux_gpio:gpiochip=1,clk=3,dat=2,rst=17,bitdelay=10 -a app.bin
//! ```
//!
//! # GPIO Pin Wiring
//!
//! | N76E003 Pin  | GPIO Function  | Raspberry Pi header |
//! |--------------|----------------|---------------------|
//! | ICPCK (P0.2) | CLK (output)   | GPIO26 (37)         |
//! | ICPDA (P1.6) | DAT (in/out)   | GPIO20 (38)         |
//! | nRST (P2.0)  | RST (output)   | GPIO21 (40)         |
//! | VDD          | 3.3V           | 3.3V (1)            |
//! | GND          | GND            | GND (39)            |
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (kernel 5.5+ for v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxGpioPgm, LinuxGpioPgmConfig};
pub use error::{LinuxGpioError, Result};

use nuvoicp_core::icp::bitbang::IcpBitbang;
use nuvoicp_core::icp::IcpTransport;

/// Open the ICP lines and return a boxed transport
///
/// This is a convenience function for use in the CLI programmer dispatch.
///
/// # Arguments
///
/// * `options` - Slice of (key, value) pairs from programmer string parsing
///
/// # Example Options
///
/// - `dev=/dev/gpiochip0` - GPIO chip device path (or use gpiochip=N)
/// - `gpiochip=0` - GPIO chip number (alternative to dev)
/// - `clk=26`, `dat=20`, `rst=21` - line offsets
/// - `bitdelay=2` - DAT/CLK half-period in microseconds
pub fn open_linux_gpio(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn IcpTransport>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let pins = LinuxGpioPgm::open(&config)?;
    Ok(Box::new(IcpBitbang::with_bit_delay(
        pins,
        config.bit_delay_us,
    )))
}
