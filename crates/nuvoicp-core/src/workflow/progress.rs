//! Progress reporting for the programming sequence

use super::sequencer::Step;

/// Progress callback for `execute` and `run`
///
/// The sequencer announces each step before issuing its transport calls and
/// reports completion afterwards. Steps that fail are started but never
/// finished.
pub trait ProgramProgress {
    /// Called when a step starts; `bytes` is the amount of data it moves
    /// (0 for steps without a payload)
    fn step_started(&mut self, step: Step, bytes: usize);

    /// Called when a step completed successfully
    fn step_finished(&mut self, step: Step);
}

/// A no-op progress reporter
pub struct NoProgress;

impl ProgramProgress for NoProgress {
    fn step_started(&mut self, _step: Step, _bytes: usize) {}
    fn step_finished(&mut self, _step: Step) {}
}
