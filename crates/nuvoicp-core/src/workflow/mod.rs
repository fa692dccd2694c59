//! Programming workflow
//!
//! One invocation runs four stages in order:
//!
//! - [`session::bootstrap`] enters ICP mode and identifies the device
//! - [`inspect::inspect`] checks the device may be used for the operation
//! - [`plan::plan_with_base`] splits the flash and derives configuration bytes
//! - [`sequencer::execute`] erases, writes, verifies and locks
//!
//! [`run`] strings them together. The session guard shuts the transport down
//! on every path out of it.

pub mod inspect;
pub mod plan;
pub mod progress;
pub mod sequencer;
pub mod session;

pub use inspect::{inspect, InspectionError, Operation, Readiness};
pub use plan::{plan, plan_with_base, PlanError, PlannedLayout};
pub use progress::{NoProgress, ProgramProgress};
pub use sequencer::{execute, Images, Outcome, ProgramReport, SequencerError, Step};
pub use session::{bootstrap, BootstrapError, Session};

use core::fmt;

use crate::config::ConfigBytes;
use crate::device::DeviceLayout;
use crate::icp::{IcpTransport, ReentryTiming};

/// Inputs of a workflow invocation
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    /// Requested operation
    pub operation: Operation,
    /// Application image for [`Operation::Write`]
    pub aprom: Option<&'a [u8]>,
    /// Loader image for [`Operation::Write`]
    pub ldrom: Option<&'a [u8]>,
    /// Assert the lock bit after a successful verify
    pub lock: bool,
    /// The user agreed to mass erase a device that does not identify
    pub mass_erase_confirmed: bool,
    /// Configuration to start planning from (blank if `None`)
    pub base_config: Option<ConfigBytes>,
    /// Re-entry sequence timing
    pub timing: ReentryTiming,
}

impl<'a> Request<'a> {
    /// A request for `operation` with no images and default settings
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            aprom: None,
            ldrom: None,
            lock: false,
            mass_erase_confirmed: false,
            base_config: None,
            timing: ReentryTiming::default(),
        }
    }

    /// Program `aprom` and/or `ldrom`
    pub fn write(aprom: Option<&'a [u8]>, ldrom: Option<&'a [u8]>) -> Self {
        Self {
            aprom,
            ldrom,
            ..Self::new(Operation::Write {
                aprom: aprom.is_some(),
                ldrom: ldrom.is_some(),
            })
        }
    }
}

/// Any failure of a workflow invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowError {
    /// Session could not be established
    Bootstrap(BootstrapError),
    /// Operation refused before touching the device
    Inspection(InspectionError),
    /// Images do not fit the flash
    Plan(PlanError),
    /// Programming sequence failed
    Sequencer(SequencerError),
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootstrap(e) => write!(f, "{}", e),
            Self::Inspection(e) => write!(f, "{}", e),
            Self::Plan(e) => write!(f, "{}", e),
            Self::Sequencer(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bootstrap(e) => Some(e),
            Self::Inspection(e) => Some(e),
            Self::Plan(e) => Some(e),
            Self::Sequencer(e) => Some(e),
        }
    }
}

impl From<BootstrapError> for WorkflowError {
    fn from(e: BootstrapError) -> Self {
        Self::Bootstrap(e)
    }
}

impl From<InspectionError> for WorkflowError {
    fn from(e: InspectionError) -> Self {
        Self::Inspection(e)
    }
}

impl From<PlanError> for WorkflowError {
    fn from(e: PlanError) -> Self {
        Self::Plan(e)
    }
}

impl From<SequencerError> for WorkflowError {
    fn from(e: SequencerError) -> Self {
        Self::Sequencer(e)
    }
}

/// Show what the device reported when the inspector turns a request away
fn log_rejection<T>(session: &mut Session<'_, T>, layout: &DeviceLayout, error: &InspectionError)
where
    T: IcpTransport + ?Sized,
{
    match error {
        InspectionError::UnsupportedDevice { identity, .. } => {
            log::info!("{}", identity.describe(layout));
            session.transport().dump_config(layout);
        }
        InspectionError::DeviceLocked { identity, config } => {
            log::info!("{}", identity.describe(layout));
            log::info!("{}", config.describe(layout));
        }
        InspectionError::NothingToDo | InspectionError::Transport(_) => {}
    }
}

/// Run one complete workflow invocation against `transport`
///
/// The transport is initialized here and shut down before returning,
/// whatever the outcome.
pub fn run<T, P>(
    transport: &mut T,
    layout: &DeviceLayout,
    request: &Request<'_>,
    progress: &mut P,
) -> Result<Outcome, WorkflowError>
where
    T: IcpTransport + ?Sized,
    P: ProgramProgress + ?Sized,
{
    let mut session = bootstrap(transport, request.timing)?;
    let readiness = match inspect(
        &mut session,
        layout,
        request.operation,
        request.mass_erase_confirmed,
    ) {
        Ok(readiness) => readiness,
        Err(e) => {
            log_rejection(&mut session, layout, &e);
            return Err(e.into());
        }
    };
    log::info!("{}", readiness.identity.describe(layout));
    log::info!("{}", readiness.config.describe(layout));

    let images = match request.operation {
        Operation::DumpConfig => {
            return Ok(Outcome::Status {
                identity: readiness.identity,
                config: readiness.config,
            })
        }
        Operation::Read => Images::default(),
        Operation::Write { aprom, ldrom } => Images {
            aprom: request.aprom.filter(|_| aprom),
            ldrom: request.ldrom.filter(|_| ldrom),
        },
    };
    if request.operation.is_destructive() && !images.any() {
        return Err(InspectionError::NothingToDo.into());
    }
    let base = request.base_config.unwrap_or(ConfigBytes::BLANK);
    let planned = plan_with_base(layout, images.ldrom.map_or(0, <[u8]>::len), base)?;
    if planned.has_loader() {
        log::debug!(
            "Planned {} KiB LDROM at 0x{:05X}, {} bytes APROM capacity",
            planned.loader_size_kb,
            planned.loader_addr(layout),
            planned.application_capacity
        );
    }

    Ok(execute(
        &mut session,
        layout,
        &planned,
        images,
        request.lock,
        progress,
    )?)
}
