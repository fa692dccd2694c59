//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use nuvoicp_core::icp::{
    ReentryTiming, DEFAULT_REENTRY_ATTEMPTS, DEFAULT_REENTRY_HOLD_US, DEFAULT_REENTRY_RELEASE_US,
};
use std::path::PathBuf;

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "nuvoicp")]
#[command(author, version, about = "N76E003 in-circuit flash programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub reentry: ReentryArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Re-entry sequence tuning shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct ReentryArgs {
    /// How long RST is held high before each re-entry attempt (µs)
    #[arg(long, global = true, default_value_t = DEFAULT_REENTRY_HOLD_US)]
    pub hold_us: u32,

    /// Delay after releasing RST before sending the entry bits (µs)
    #[arg(long, global = true, default_value_t = DEFAULT_REENTRY_RELEASE_US)]
    pub release_us: u32,

    /// Number of re-entry attempts before giving up
    #[arg(long, global = true, default_value_t = DEFAULT_REENTRY_ATTEMPTS)]
    pub reentry_attempts: u32,
}

impl ReentryArgs {
    pub fn timing(&self) -> ReentryTiming {
        ReentryTiming {
            hold_us: self.hold_us,
            release_us: self.release_us,
            max_attempts: self.reentry_attempts,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show device identity and configuration
    Status {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Save the configuration bytes to a TOML file
        #[arg(long)]
        save_config: Option<PathBuf>,
    },

    /// Read the whole flash to a file
    Read {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Erase the device and program APROM and/or LDROM
    Write {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Application image
        #[arg(short, long, required_unless_present = "ldrom")]
        aprom: Option<PathBuf>,

        /// Loader image (sizes the LDROM and boots from it)
        #[arg(short, long)]
        ldrom: Option<PathBuf>,

        /// Lock the device after a successful verify
        #[arg(long)]
        lock: bool,

        /// Configuration file (TOML) to start from
        #[arg(long)]
        config: Option<PathBuf>,

        /// Mass erase even if the device does not identify itself
        #[arg(long)]
        mass_erase: bool,

        /// Answer yes to confirmation prompts
        #[arg(short, long)]
        yes: bool,
    },

    /// List supported programmers
    ListProgrammers,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_write_needs_an_image() {
        assert!(Cli::try_parse_from(["nuvoicp", "write", "-p", "dummy"]).is_err());
        let cli =
            Cli::try_parse_from(["nuvoicp", "write", "-p", "dummy", "-l", "ldr.bin"]).unwrap();
        assert!(matches!(cli.command, Commands::Write { aprom: None, .. }));
    }

    #[test]
    fn test_reentry_defaults() {
        let cli = Cli::try_parse_from(["nuvoicp", "status", "-p", "dummy"]).unwrap();
        assert_eq!(cli.reentry.timing(), ReentryTiming::default());

        let cli = Cli::try_parse_from([
            "nuvoicp",
            "status",
            "-p",
            "dummy",
            "--hold-us",
            "20000",
            "--reentry-attempts",
            "3",
        ])
        .unwrap();
        let timing = cli.reentry.timing();
        assert_eq!(timing.hold_us, 20000);
        assert_eq!(timing.max_attempts, 3);
        assert_eq!(timing.release_us, DEFAULT_REENTRY_RELEASE_US);
    }
}
