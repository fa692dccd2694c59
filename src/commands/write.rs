//! Write command implementation

use super::{read_file, IndicatifProgress};
use crate::programmers::open_programmer;
use nuvoicp_core::config::ConfigBytes;
use nuvoicp_core::device::DeviceLayout;
use nuvoicp_core::icp::ReentryTiming;
use nuvoicp_core::workflow::{self, InspectionError, Outcome, Request, WorkflowError};
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Options of the write command
pub struct WriteArgs<'a> {
    pub aprom: Option<&'a Path>,
    pub ldrom: Option<&'a Path>,
    pub lock: bool,
    pub config: Option<&'a Path>,
    pub mass_erase: bool,
    pub assume_yes: bool,
}

/// Ask a yes/no question on stdin, defaulting to no
fn confirm(question: &str) -> Result<bool, Box<dyn std::error::Error>> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

/// Erase the device, then program, verify and optionally lock it
pub fn run_write(
    programmer: &str,
    timing: ReentryTiming,
    args: &WriteArgs<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = DeviceLayout::N76E003;

    let aprom = args.aprom.map(read_file).transpose()?;
    let ldrom = args.ldrom.map(read_file).transpose()?;
    let base_config = match args.config {
        Some(path) => {
            let config = ConfigBytes::from_toml_file(path)?;
            log::info!("Loaded configuration from {:?}", path);
            Some(config)
        }
        None => None,
    };

    let mut request = Request::write(aprom.as_deref(), ldrom.as_deref());
    request.lock = args.lock;
    request.base_config = base_config;
    request.timing = timing;
    request.mass_erase_confirmed = args.mass_erase;

    let mut transport = open_programmer(programmer)?;

    let mut progress = IndicatifProgress::new();
    let outcome = match workflow::run(&mut *transport, &layout, &request, &mut progress) {
        Err(WorkflowError::Inspection(InspectionError::UnsupportedDevice {
            identity,
            recoverable: true,
        })) => {
            println!("{}", identity.describe(&layout));
            println!();
            println!(
                "Device ID 0x{:04x} is not a {}. The chip may be locked.",
                identity.device_id, layout.name
            );
            let question = "Mass erase the device to recover it? All flash contents will be lost.";
            if !(args.assume_yes || confirm(question)?) {
                return Err("aborted, device left untouched".into());
            }
            request.mass_erase_confirmed = true;
            let mut progress = IndicatifProgress::new();
            workflow::run(&mut *transport, &layout, &request, &mut progress)?
        }
        result => result?,
    };

    let Outcome::Programmed(report) = outcome else {
        return Err("unexpected workflow outcome for write".into());
    };

    if report.ldrom_written > 0 {
        println!(
            "Programmed {} bytes to LDROM ({} KiB, boot from LDROM)",
            report.ldrom_written,
            report.config.ldrom_size(&layout) / 1024
        );
    }
    if report.aprom_written > 0 {
        println!("Programmed {} bytes to APROM", report.aprom_written);
    }
    println!("Verify OK");
    if report.locked {
        println!("Device locked");
    }

    Ok(())
}
