//! Control record and run status.
//!
//! One control record exists per loop id. It is created (or loaded) when a
//! loop starts, mutated exclusively by the controller holding Running for
//! that id, and frozen once a terminal status is reached.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::RunConfig;
use crate::id::now_ms;
use crate::progress::ProgressLog;

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Waiting to start (new, resumed, or recovered)
    Pending,
    /// Claimed by a live controller
    Running,
    /// Suspended by a Pause signal (resumable)
    Paused,
    /// Validation, completion token, and gates all held
    Complete,
    /// Max cycles exhausted, a limit hit, or workspace lost
    Failed,
    /// Ended by a Stop or Invalidate signal
    Stopped,
}

impl RunStatus {
    /// Terminal statuses are never re-entered or mutated again
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Failed | RunStatus::Stopped)
    }

    /// Whether an external scheduler may transition this back to Pending
    pub fn is_resumable(&self) -> bool {
        matches!(self, RunStatus::Paused)
    }
}

/// The durable control record for one loop instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRecord {
    /// Unique identifier (timestamp + random suffix: "1738300800123-a1b2")
    pub id: String,

    /// Static configuration; immutable once the run starts
    pub config: RunConfig,

    /// The versioned working copy the agent's actions are applied to
    pub workspace: PathBuf,

    /// Completed cycles; never exceeds `config.max_cycles` at termination
    pub cycle_count: u32,

    /// Current status
    pub status: RunStatus,

    /// Accumulated cycle feedback; append-only, oldest-first eviction
    pub progress: ProgressLog,

    pub created_at: i64,
    pub updated_at: i64,
}

impl ControlRecord {
    /// Create a fresh record in Pending status
    pub fn new(id: impl Into<String>, config: RunConfig, workspace: impl Into<PathBuf>) -> Self {
        let now = now_ms() as i64;
        Self {
            id: id.into(),
            config,
            workspace: workspace.into(),
            cycle_count: 0,
            status: RunStatus::Pending,
            progress: ProgressLog::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the timestamp
    pub fn touch(&mut self) {
        self.updated_at = now_ms() as i64;
    }
}
