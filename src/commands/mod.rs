//! CLI command implementations
//!
//! Each command opens the selected programmer and runs one invocation of
//! `nuvoicp_core::workflow::run` against it. Progress is rendered with
//! indicatif spinners.

pub mod read;
pub mod status;
pub mod write;

use crate::programmers;
use indicatif::{ProgressBar, ProgressStyle};
use nuvoicp_core::workflow::{ProgramProgress, Step};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// List all supported programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    for p in programmers::available_programmers() {
        println!("  {:12} - {}", p.name, p.description);
        if !p.aliases.is_empty() {
            println!("  {:12}   aliases: {}", "", p.aliases.join(", "));
        }
    }
}

/// Read file contents into a Vec
fn read_file(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let data = fs::read(path).map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
    println!("Read {} bytes from {:?}", data.len(), path);
    Ok(data)
}

/// Create a standard spinner style
fn create_spinner_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?)
}

/// Progress reporter using one indicatif spinner per step
pub struct IndicatifProgress {
    current: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self { current: None }
    }

    fn finish(&mut self, message: String) {
        if let Some(pb) = self.current.take() {
            pb.finish_with_message(message);
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        // A step that failed never gets its finish call
        if let Some(pb) = self.current.take() {
            pb.abandon();
        }
    }
}

impl ProgramProgress for IndicatifProgress {
    fn step_started(&mut self, step: Step, bytes: usize) {
        self.finish(String::from("done"));
        let pb = ProgressBar::new_spinner();
        pb.set_style(create_spinner_style().unwrap_or_else(|_| ProgressStyle::default_spinner()));
        if bytes > 0 {
            pb.set_message(format!("{} ({} bytes)...", step, bytes));
        } else {
            pb.set_message(format!("{}...", step));
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current = Some(pb);
    }

    fn step_finished(&mut self, step: Step) {
        self.finish(format!("{} complete", step));
    }
}
