//! Run outcome types.

use std::path::PathBuf;

use super::signal::Signal;

/// Outcome of a run. Exactly one variant is produced per call to
/// `LoopController::run`; `cycles` is the count at termination, and for
/// `Complete` it is the cycle that achieved success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Validation passed, completion token found, all gates held
    Complete { cycles: u32, artifacts: Vec<PathBuf> },
    /// Max cycles exhausted, a run limit hit, or recovery found the
    /// workspace gone
    Failed { reason: String, cycles: u32 },
    /// A Stop, Pause, or Invalidate signal preempted the run
    Stopped { signal: Signal, cycles: u32 },
}

impl RunOutcome {
    /// Cycle count at termination
    pub fn cycles(&self) -> u32 {
        match self {
            RunOutcome::Complete { cycles, .. }
            | RunOutcome::Failed { cycles, .. }
            | RunOutcome::Stopped { cycles, .. } => *cycles,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, RunOutcome::Complete { .. })
    }
}
