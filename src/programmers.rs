//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all programmers, with support
//! for feature-gated inclusion and dynamic help text generation.

use nuvoicp_core::icp::IcpTransport;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &[],
        description:
            "In-memory N76E003 emulator (locked=1,hidden=1,devid=<id>,cid=<id>,image=<file>)",
    });

    #[cfg(feature = "linux-gpio")]
    programmers.push(ProgrammerInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpio"],
        description: "Linux GPIO bitbang (gpiochip=<n>,clk=<n>,dat=<n>,rst=<n>,bitdelay=<us>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:12} - {}\n", p.name, p.description));
    }
    help
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Resolve a programmer name or alias to its canonical name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the programmer named by `programmer`
///
/// The programmer string can be just the name (e.g., "linux_gpio") or include
/// parameters (e.g., "linux_gpio:gpiochip=1,clk=3").
#[allow(unused_variables)]
pub fn open_programmer(
    programmer: &str,
) -> Result<Box<dyn IcpTransport>, Box<dyn std::error::Error>> {
    let (name, options) = parse_programmer_string(programmer);

    let canonical_name = match find_programmer(name) {
        Some(n) => n,
        None => return Err(unknown_programmer_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&options),

        #[cfg(feature = "linux-gpio")]
        "linux_gpio" => {
            log::info!("Opening Linux GPIO programmer...");
            nuvoicp_linux_gpio::open_linux_gpio(&options).map_err(|e| {
                format!(
                    "Failed to open Linux GPIO programmer: {}\n\
                     Make sure the gpiochip exists and you have read/write permissions.",
                    e
                )
                .into()
            })
        }

        _ => Err(unknown_programmer_error(name)),
    }
}

#[cfg(feature = "dummy")]
fn parse_number<T>(key: &str, value: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: TryFrom<u32>,
{
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    }
    .map_err(|e| format!("Invalid dummy option {}={}: {}", key, value, e))?;
    T::try_from(parsed)
        .map_err(|_| format!("Dummy option {}={} is out of range", key, value).into())
}

#[cfg(feature = "dummy")]
fn parse_flag(key: &str, value: &str) -> Result<bool, Box<dyn std::error::Error>> {
    match value {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(format!("Invalid dummy option {}={}: expected 0 or 1", key, value).into()),
    }
}

/// Build the emulator from its options
#[cfg(feature = "dummy")]
fn open_dummy(
    options: &[(&str, &str)],
) -> Result<Box<dyn IcpTransport>, Box<dyn std::error::Error>> {
    use nuvoicp_dummy::{DummyConfig, DummyIcp};

    let mut cfg = DummyConfig::default();
    let mut image = None;

    for &(key, value) in options {
        match key {
            "locked" => {
                if parse_flag(key, value)? {
                    cfg.config.set_locked(true);
                }
            }
            "hidden" => cfg.reentry_reveals_identity = !parse_flag(key, value)?,
            "devid" => cfg.device_id = parse_number(key, value)?,
            "cid" => cfg.company_id = parse_number(key, value)?,
            "image" => image = Some(value),
            _ => log::warn!("dummy: Unknown option: {}={}", key, value),
        }
    }

    log::info!("Using dummy N76E003 emulator");

    let dev = match image {
        Some(path) => {
            let data = std::fs::read(path)
                .map_err(|e| format!("Failed to read dummy image {}: {}", path, e))?;
            DummyIcp::with_data(cfg, &data)
        }
        None => DummyIcp::new(cfg),
    };
    Ok(Box::new(dev))
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'nuvoicp list-programmers' for more details");
    msg.into()
}
