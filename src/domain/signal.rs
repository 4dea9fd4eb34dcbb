//! Signal kinds for out-of-band loop control
//!
//! Signals are delivered asynchronously and read non-blockingly by the
//! controller at cycle boundaries only.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Out-of-band control signal for a running loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Terminate at the next cycle boundary
    Stop,
    /// Suspend execution (resumable)
    Pause,
    /// Transition a paused record back to runnable; consumed by the
    /// scheduler, not the controller
    Resume,
    /// The work is stale; terminate at the next cycle boundary
    Invalidate,
}

impl Signal {
    /// Signals that end the run when observed by the controller
    pub fn is_terminal(&self) -> bool {
        matches!(self, Signal::Stop | Signal::Invalidate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Stop => "stop",
            Signal::Pause => "pause",
            Signal::Resume => "resume",
            Signal::Invalidate => "invalidate",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
