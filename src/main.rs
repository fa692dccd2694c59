//! nuvoicp - In-circuit flash programmer for the Nuvoton N76E003
//!
//! Every command runs one invocation of the programming workflow in
//! `nuvoicp_core::workflow`: the session is bootstrapped, the device state
//! is inspected, the flash split is planned, and the sequencer erases,
//! writes, verifies and optionally locks.
//!
//! The ICP lines are reached through a programmer backend selected with
//! `-p name[:key=value,...]`, either Linux GPIO lines or an in-memory
//! emulator for dry runs.

mod cli;
mod commands;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let timing = cli.reentry.timing();

    let result = match cli.command {
        Commands::Status {
            programmer,
            save_config,
        } => commands::status::run_status(&programmer, timing, save_config.as_deref()),
        Commands::Read { programmer, output } => {
            commands::read::run_read(&programmer, timing, &output)
        }
        Commands::Write {
            programmer,
            aprom,
            ldrom,
            lock,
            config,
            mass_erase,
            yes,
        } => {
            let args = commands::write::WriteArgs {
                aprom: aprom.as_deref(),
                ldrom: ldrom.as_deref(),
                lock,
                config: config.as_deref(),
                mass_erase,
                assume_yes: yes,
            };
            commands::write::run_write(&programmer, timing, &args)
        }
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
