//! Domain types for Cyclr
//!
//! - ControlRecord: the durable per-loop record with config, status, and
//!   accumulated progress
//! - RunOutcome: result of a run (Complete, Failed, Stopped)
//! - Signal: out-of-band control (stop, pause, resume, invalidate)

pub mod outcome;
pub mod record;
pub mod signal;

pub use outcome::RunOutcome;
pub use record::{ControlRecord, RunStatus};
pub use signal::Signal;
