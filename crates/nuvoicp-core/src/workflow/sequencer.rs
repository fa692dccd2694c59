//! Erase, write, verify and lock sequencing
//!
//! The sequence is linear:
//!
//! 1. mass erase (plus re-entry if the device was locked)
//! 2. configuration bytes, then the loader image
//! 3. application image
//! 4. full-flash read back and compare, then configuration read back
//! 5. lock, only if requested and only after a clean verify
//!
//! With no image to write, the flash is read out instead.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use super::plan::PlannedLayout;
use super::progress::ProgramProgress;
use super::session::Session;
use crate::config::ConfigBytes;
use crate::device::{DeviceIdentity, DeviceLayout, CFG_FLASH_LEN, ERASED_BYTE};
use crate::error::Error;
use crate::icp::IcpTransport;

/// Steps of the programming sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Mass erase
    Erase,
    /// Re-entry after erasing a locked device
    Reentry,
    /// Writing the configuration bytes
    WriteConfig,
    /// Writing the loader region
    WriteLoader,
    /// Writing the application region
    WriteApplication,
    /// Reading back and comparing
    Verify,
    /// Writing the configuration bytes with the lock asserted
    Lock,
    /// Reading the flash out
    Read,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Erase => "mass erase",
            Self::Reentry => "re-entry",
            Self::WriteConfig => "configuration write",
            Self::WriteLoader => "LDROM write",
            Self::WriteApplication => "APROM write",
            Self::Verify => "verify",
            Self::Lock => "lock",
            Self::Read => "flash read",
        };
        f.write_str(s)
    }
}

/// Images to program; `None` leaves the region alone
#[derive(Debug, Clone, Copy, Default)]
pub struct Images<'a> {
    /// Application image, written at the start of flash
    pub aprom: Option<&'a [u8]>,
    /// Loader image, written at the top of flash
    pub ldrom: Option<&'a [u8]>,
}

impl Images<'_> {
    /// Whether anything is to be written
    pub fn any(&self) -> bool {
        self.aprom.is_some() || self.ldrom.is_some()
    }
}

/// What was written by a successful programming run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramReport {
    /// Identity of the programmed device
    pub identity: DeviceIdentity,
    /// Configuration bytes now on the device
    pub config: ConfigBytes,
    /// Bytes written to the application region
    pub aprom_written: usize,
    /// Bytes written to the loader region
    pub ldrom_written: usize,
    /// Whether the lock was asserted
    pub locked: bool,
}

/// Result of a workflow invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Identity and configuration only
    Status {
        /// Device identity
        identity: DeviceIdentity,
        /// Configuration bytes
        config: ConfigBytes,
    },
    /// Flash contents
    Read {
        /// Device identity
        identity: DeviceIdentity,
        /// Configuration bytes
        config: ConfigBytes,
        /// The whole flash array
        data: Vec<u8>,
    },
    /// Programming completed and verified
    Programmed(ProgramReport),
}

/// Failures of the programming sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerError {
    /// A transport call failed
    Transport {
        /// Step that was running
        step: Step,
        /// Underlying fault
        source: Error,
    },
    /// Flash read back differs from what was written
    VerifyMismatch {
        /// First differing offset
        offset: usize,
        /// Byte that was written there
        expected: u8,
        /// Byte that was read back
        found: u8,
        /// Number of differing bytes
        mismatches: usize,
    },
    /// Configuration bytes read back differ from the planned ones
    ConfigMismatch {
        /// Planned configuration
        expected: ConfigBytes,
        /// Configuration read back
        found: ConfigBytes,
    },
    /// The loader image is larger than the planned loader region
    LoaderExceedsPlan {
        /// Image length
        len: usize,
        /// Planned region size
        planned: usize,
    },
    /// A loader image was given but it is empty
    EmptyLoader,
}

impl fmt::Display for SequencerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { step, source } => write!(f, "{} failed: {}", step, source),
            Self::VerifyMismatch {
                offset,
                expected,
                found,
                mismatches,
            } => write!(
                f,
                "verify failed: {} bytes differ, first at 0x{:05X} (expected 0x{:02X}, found 0x{:02X})",
                mismatches, offset, expected, found
            ),
            Self::ConfigMismatch { expected, found } => write!(
                f,
                "configuration verify failed: expected {:02X?}, found {:02X?}",
                expected.as_bytes(),
                found.as_bytes()
            ),
            Self::LoaderExceedsPlan { len, planned } => write!(
                f,
                "loader image of {} bytes does not fit the planned {} byte region",
                len, planned
            ),
            Self::EmptyLoader => write!(f, "loader image is empty"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SequencerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Build the full-flash image expected after programming
///
/// Everything outside the two images keeps the erased value.
pub fn expected_image(
    layout: &DeviceLayout,
    plan: &PlannedLayout,
    aprom: Option<&[u8]>,
    ldrom: Option<&[u8]>,
) -> Vec<u8> {
    let mut image = vec![ERASED_BYTE; layout.flash_size];
    if let Some(app) = aprom {
        let len = app.len().min(plan.application_capacity);
        image[..len].copy_from_slice(&app[..len]);
    }
    if let Some(loader) = ldrom {
        let start = layout.flash_size - plan.loader_size;
        let len = loader.len().min(plan.loader_size);
        image[start..start + len].copy_from_slice(&loader[..len]);
    }
    image
}

fn compare(expected: &[u8], found: &[u8]) -> Result<(), SequencerError> {
    let mut first = None;
    let mut mismatches = 0;
    for (offset, (&e, &f)) in expected.iter().zip(found).enumerate() {
        if e != f {
            mismatches += 1;
            first.get_or_insert((offset, e, f));
        }
    }
    match first {
        None => Ok(()),
        Some((offset, expected, found)) => Err(SequencerError::VerifyMismatch {
            offset,
            expected,
            found,
            mismatches,
        }),
    }
}

/// Run a transport call as `step`, reporting progress
fn run_step<T, P, R>(
    transport: &mut T,
    progress: &mut P,
    step: Step,
    bytes: usize,
    f: impl FnOnce(&mut T) -> crate::error::Result<R>,
) -> Result<R, SequencerError>
where
    T: IcpTransport + ?Sized,
    P: ProgramProgress + ?Sized,
{
    progress.step_started(step, bytes);
    let r = f(transport).map_err(|source| SequencerError::Transport { step, source })?;
    progress.step_finished(step);
    Ok(r)
}

/// Execute the programming sequence, or read the flash out if `images`
/// holds nothing to write
///
/// `lock_after_verify` asserts the lock bit once the read back matched. The
/// lock is never verified since a locked device no longer returns its flash.
pub fn execute<T, P>(
    session: &mut Session<'_, T>,
    layout: &DeviceLayout,
    plan: &PlannedLayout,
    images: Images<'_>,
    lock_after_verify: bool,
    progress: &mut P,
) -> Result<Outcome, SequencerError>
where
    T: IcpTransport + ?Sized,
    P: ProgramProgress + ?Sized,
{
    if !images.any() {
        return read_out(session, layout, progress);
    }

    let aprom = images.aprom.map(|app| {
        if app.len() > plan.application_capacity {
            log::warn!(
                "APROM image of {} bytes truncated to {} bytes",
                app.len(),
                plan.application_capacity
            );
            &app[..plan.application_capacity]
        } else {
            app
        }
    });
    let ldrom = images.ldrom;
    if let Some(loader) = ldrom {
        // An empty loader would plan no region and boot from APROM
        if loader.is_empty() {
            return Err(SequencerError::EmptyLoader);
        }
        if loader.len() > plan.loader_size {
            return Err(SequencerError::LoaderExceedsPlan {
                len: loader.len(),
                planned: plan.loader_size,
            });
        }
    }

    let was_locked =
        session.config().is_some_and(|c| c.is_locked()) || session.identity().is_locked_sentinel();

    log::info!("Erasing flash...");
    run_step(session.transport(), progress, Step::Erase, layout.flash_size, |t| {
        t.mass_erase()
    })?;
    if was_locked {
        log::info!("Device was locked, re-entering ICP mode");
        progress.step_started(Step::Reentry, 0);
        session.reenter().map_err(|source| SequencerError::Transport {
            step: Step::Reentry,
            source,
        })?;
        progress.step_finished(Step::Reentry);
    }

    // Configuration first: it decides where the loader region starts
    if ldrom.is_some() || plan.config != ConfigBytes::BLANK {
        run_step(session.transport(), progress, Step::WriteConfig, CFG_FLASH_LEN, |t| {
            t.write_flash(layout.cfg_addr, plan.config.as_bytes())
        })?;
    }
    if let Some(loader) = ldrom {
        log::info!("Programming LDROM...");
        run_step(session.transport(), progress, Step::WriteLoader, loader.len(), |t| {
            t.write_flash(plan.loader_addr(layout), loader)
        })?;
        log::info!("Programmed LDROM ({} bytes)", loader.len());
    }
    if let Some(app) = aprom {
        log::info!("Programming APROM...");
        run_step(session.transport(), progress, Step::WriteApplication, app.len(), |t| {
            t.write_flash(layout.aprom_addr, app)
        })?;
        log::info!("Programmed APROM ({} bytes)", app.len());
    }

    let expected = expected_image(layout, plan, aprom, ldrom);
    let mut found = vec![0u8; layout.flash_size];
    let mut found_config = [0u8; CFG_FLASH_LEN];
    run_step(session.transport(), progress, Step::Verify, layout.flash_size, |t| {
        t.read_flash(layout.aprom_addr, &mut found)?;
        t.read_flash(layout.cfg_addr, &mut found_config)
    })?;
    let found_config = ConfigBytes::from_bytes(found_config);

    if let Err(e) = compare(&expected, &found) {
        session.transport().dump_config(layout);
        log::error!("Error when verifying flash");
        return Err(e);
    }
    if found_config != plan.config {
        session.transport().dump_config(layout);
        log::error!("Error when verifying configuration bytes");
        return Err(SequencerError::ConfigMismatch {
            expected: plan.config,
            found: found_config,
        });
    }
    log::info!("Entire flash verified successfully");

    let mut final_config = plan.config;
    if lock_after_verify {
        final_config.set_locked(true);
        log::info!("Locking device");
        run_step(session.transport(), progress, Step::Lock, CFG_FLASH_LEN, |t| {
            t.write_flash(layout.cfg_addr, final_config.as_bytes())
        })?;
    }
    session.transport().dump_config(layout);

    Ok(Outcome::Programmed(ProgramReport {
        identity: *session.identity(),
        config: final_config,
        aprom_written: aprom.map_or(0, <[u8]>::len),
        ldrom_written: ldrom.map_or(0, <[u8]>::len),
        locked: lock_after_verify,
    }))
}

fn read_out<T, P>(
    session: &mut Session<'_, T>,
    layout: &DeviceLayout,
    progress: &mut P,
) -> Result<Outcome, SequencerError>
where
    T: IcpTransport + ?Sized,
    P: ProgramProgress + ?Sized,
{
    let config = match session.config() {
        Some(c) => c,
        None => session
            .read_config(layout)
            .map_err(|source| SequencerError::Transport {
                step: Step::Read,
                source,
            })?,
    };
    session.transport().dump_config(layout);

    let mut data = vec![0u8; layout.flash_size];
    run_step(session.transport(), progress, Step::Read, layout.flash_size, |t| {
        t.read_flash(layout.aprom_addr, &mut data)
    })?;
    log::info!("Flash successfully read");

    Ok(Outcome::Read {
        identity: *session.identity(),
        config,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::FLASH_SIZE;
    use crate::workflow::plan::plan;

    const N76: DeviceLayout = DeviceLayout::N76E003;

    #[test]
    fn test_expected_image_pads_with_erased() {
        let app = vec![0x11u8; 18000];
        let p = plan(&N76, 0).unwrap();
        let image = expected_image(&N76, &p, Some(app.as_slice()), None);
        assert_eq!(image.len(), FLASH_SIZE);
        assert!(image[..18000].iter().all(|&b| b == 0x11));
        assert!(image[18000..].iter().all(|&b| b == ERASED_BYTE));
    }

    #[test]
    fn test_expected_image_places_loader_at_top() {
        let loader = [0x22u8; 1500];
        let p = plan(&N76, loader.len()).unwrap();
        let image = expected_image(&N76, &p, Some(&[0x33u8; 4][..]), Some(&loader[..]));
        assert_eq!(&image[..4], &[0x33; 4]);
        assert!(image[4..FLASH_SIZE - 2048].iter().all(|&b| b == ERASED_BYTE));
        assert!(image[FLASH_SIZE - 2048..FLASH_SIZE - 548].iter().all(|&b| b == 0x22));
        assert!(image[FLASH_SIZE - 548..].iter().all(|&b| b == ERASED_BYTE));
    }

    #[test]
    fn test_compare_reports_first_and_count() {
        let expected = [0xFF; 8];
        let mut found = [0xFF; 8];
        found[3] = 0x00;
        found[6] = 0x12;
        assert_eq!(
            compare(&expected, &found),
            Err(SequencerError::VerifyMismatch {
                offset: 3,
                expected: 0xFF,
                found: 0x00,
                mismatches: 2
            })
        );
        assert_eq!(compare(&expected, &expected), Ok(()));
    }
}
