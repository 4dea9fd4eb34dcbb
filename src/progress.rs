//! Bounded progress feedback across cycles.
//!
//! Each cycle appends one structured entry; the rendered text is folded into
//! the next outbound message verbatim. Accumulation is bounded: on overflow
//! the oldest entries are dropped first, never the most recent. Unbounded
//! feedback would reintroduce the context degradation the fresh-context
//! design exists to avoid.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::id::now_ms;

/// Caps on progress accumulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressCap {
    /// Maximum number of retained entries
    pub max_entries: usize,
    /// Maximum total rendered characters
    pub max_chars: usize,
}

impl Default for ProgressCap {
    fn default() -> Self {
        Self {
            max_entries: 50,
            max_chars: 32_768,
        }
    }
}

/// One cycle's outcome, as recorded in the progress log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEntry {
    /// Cycle index (1-based)
    pub cycle: u32,
    /// When the entry was recorded (Unix ms)
    pub timestamp_ms: u64,
    /// Whether the agent emitted the completion token
    pub promise_found: bool,
    /// Whether the validation command passed
    pub validation_passed: bool,
    /// Whether all quality gates held
    pub gates_passed: bool,
    /// One-line description of the cycle outcome
    pub summary: String,
    /// Captured error lines on failure (ordered, may be empty)
    pub errors: Vec<String>,
}

impl CycleEntry {
    /// Create a freeform note entry, used for recovery annotations
    pub fn note(cycle: u32, text: impl Into<String>) -> Self {
        Self {
            cycle,
            timestamp_ms: now_ms(),
            promise_found: false,
            validation_passed: false,
            gates_passed: false,
            summary: text.into(),
            errors: Vec::new(),
        }
    }

    /// Render this entry as human-readable text
    pub fn render(&self) -> String {
        let when = DateTime::from_timestamp_millis(self.timestamp_ms as i64)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_default();

        let mut out = format!(
            "## Cycle {}\nTimestamp: {}\nValidation: {}\nPromise: {}\nGates: {}\nSummary: {}\n",
            self.cycle,
            when,
            if self.validation_passed { "PASSED" } else { "FAILED" },
            if self.promise_found { "FOUND" } else { "NOT FOUND" },
            if self.gates_passed { "PASSED" } else { "FAILED" },
            self.summary
        );
        for error in &self.errors {
            out.push_str("- ");
            out.push_str(error);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// The ordered, append-only progress log persisted inside the control record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressLog {
    pub entries: Vec<CycleEntry>,
}

impl ProgressLog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the whole log as text; derivable from a persisted record at
    /// any time for external monitoring
    pub fn render(&self) -> String {
        self.entries.iter().map(|e| e.render()).collect()
    }
}

/// Accumulates cycle entries under the configured caps
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    log: ProgressLog,
    cap: ProgressCap,
}

impl ProgressTracker {
    pub fn new(cap: ProgressCap) -> Self {
        Self {
            log: ProgressLog::default(),
            cap,
        }
    }

    /// Resume tracking from a persisted log
    pub fn from_log(log: ProgressLog, cap: ProgressCap) -> Self {
        let mut tracker = Self { log, cap };
        tracker.evict();
        tracker
    }

    /// Append one entry, evicting oldest-first on overflow
    pub fn append(&mut self, entry: CycleEntry) {
        self.log.entries.push(entry);
        self.evict();
    }

    /// Rendered feedback text for the next outbound message
    pub fn render(&self) -> String {
        self.log.render()
    }

    pub fn log(&self) -> &ProgressLog {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Drop all accumulated entries (Invalidate with
    /// `invalidate_clears_progress` set)
    pub fn clear(&mut self) {
        self.log.entries.clear();
    }

    fn evict(&mut self) {
        while self.log.entries.len() > self.cap.max_entries {
            self.log.entries.remove(0);
        }
        // Character cap: drop oldest entries until the rendering fits, but
        // never the most recent entry.
        while self.log.entries.len() > 1 && self.rendered_chars() > self.cap.max_chars {
            self.log.entries.remove(0);
        }
    }

    fn rendered_chars(&self) -> usize {
        self.log.entries.iter().map(|e| e.render().len()).sum()
    }
}
