//! Status command implementation

use crate::programmers::open_programmer;
use nuvoicp_core::device::DeviceLayout;
use nuvoicp_core::icp::ReentryTiming;
use nuvoicp_core::workflow::{self, NoProgress, Operation, Outcome, Request};
use std::path::Path;

/// Print the device identity and configuration, optionally saving the
/// configuration bytes as TOML
pub fn run_status(
    programmer: &str,
    timing: ReentryTiming,
    save_config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = DeviceLayout::N76E003;
    let mut transport = open_programmer(programmer)?;

    let request = Request {
        timing,
        ..Request::new(Operation::DumpConfig)
    };
    let outcome = workflow::run(&mut *transport, &layout, &request, &mut NoProgress)?;

    let Outcome::Status { identity, config } = outcome else {
        return Err("unexpected workflow outcome for status".into());
    };

    println!("{}", identity.describe(&layout));
    println!();
    println!("{}", config.describe(&layout));

    if let Some(path) = save_config {
        config.to_toml_file(path)?;
        println!("Configuration saved to {:?}", path);
    }

    Ok(())
}
