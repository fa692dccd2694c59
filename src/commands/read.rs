//! Read command implementation

use super::IndicatifProgress;
use crate::programmers::open_programmer;
use nuvoicp_core::device::DeviceLayout;
use nuvoicp_core::icp::ReentryTiming;
use nuvoicp_core::workflow::{self, Operation, Outcome, Request};
use std::fs;
use std::path::Path;

/// Read the whole flash array into `output`
pub fn run_read(
    programmer: &str,
    timing: ReentryTiming,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = DeviceLayout::N76E003;
    let mut transport = open_programmer(programmer)?;

    let request = Request {
        timing,
        ..Request::new(Operation::Read)
    };
    let mut progress = IndicatifProgress::new();
    let outcome = workflow::run(&mut *transport, &layout, &request, &mut progress)?;

    let Outcome::Read { config, data, .. } = outcome else {
        return Err("unexpected workflow outcome for read".into());
    };

    fs::write(output, &data).map_err(|e| format!("Failed to write {:?}: {}", output, e))?;
    println!(
        "Read {} bytes ({} bytes APROM, {} bytes LDROM) to {:?}",
        data.len(),
        config.aprom_size(&layout),
        config.ldrom_size(&layout),
        output
    );

    Ok(())
}
