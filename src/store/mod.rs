//! Durable keyed storage for control records.
//!
//! One JSON file per record, written atomically (temp file + rename). The
//! conditional status transition is the mutual-exclusion primitive: claiming
//! a loop at start and every crash-safe transition go through it. Terminal
//! records are frozen; any further write is rejected to preserve audit
//! integrity.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::{ControlRecord, RunStatus};
use crate::error::{CyclrError, Result};
use crate::progress::CycleEntry;

/// Storage contract for control records
pub trait StateStore: Send + Sync {
    /// Persist a record; rejected if the stored record is already terminal
    fn save(&self, record: &ControlRecord) -> Result<()>;

    /// Load a record by id
    fn load(&self, id: &str) -> Result<Option<ControlRecord>>;

    /// Append a freeform note to a record's progress log
    fn append_progress(&self, id: &str, text: &str) -> Result<()>;

    /// Atomically transition status if it currently equals `expected`.
    /// Returns false without mutation on a mismatch.
    fn compare_and_set_status(&self, id: &str, expected: RunStatus, new: RunStatus)
    -> Result<bool>;

    /// All records currently in the given status
    fn list_by_status(&self, status: RunStatus) -> Result<Vec<ControlRecord>>;
}

/// File-backed store: `{base}/{id}.json` per record
pub struct FileStateStore {
    base_path: PathBuf,
    // Serializes read-modify-write sequences (save guard, CAS, append)
    lock: Mutex<()>,
}

impl FileStateStore {
    /// Open or create a store rooted at the given directory
    pub fn open(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            lock: Mutex::new(()),
        })
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", id))
    }

    fn read_record(&self, id: &str) -> Result<Option<ControlRecord>> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let record = serde_json::from_str(&content)
            .map_err(|e| CyclrError::Storage(format!("corrupt record {}: {}", id, e)))?;
        Ok(Some(record))
    }

    /// Atomic write: temp file in the same directory, then rename
    fn write_record(&self, record: &ControlRecord) -> Result<()> {
        let path = self.record_path(&record.id);
        let tmp = self.base_path.join(format!("{}.json.tmp", record.id));
        let content = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|e| CyclrError::Storage(e.to_string()))
    }
}

impl StateStore for FileStateStore {
    fn save(&self, record: &ControlRecord) -> Result<()> {
        let _guard = self.guard()?;

        if let Some(existing) = self.read_record(&record.id)?
            && existing.status.is_terminal()
        {
            return Err(CyclrError::InvalidState(format!(
                "record {} is terminal ({:?}) and immutable",
                record.id, existing.status
            )));
        }

        self.write_record(record)
    }

    fn load(&self, id: &str) -> Result<Option<ControlRecord>> {
        let _guard = self.guard()?;
        self.read_record(id)
    }

    fn append_progress(&self, id: &str, text: &str) -> Result<()> {
        let _guard = self.guard()?;

        let mut record = self
            .read_record(id)?
            .ok_or_else(|| CyclrError::RecordNotFound(id.to_string()))?;
        if record.status.is_terminal() {
            return Err(CyclrError::InvalidState(format!(
                "record {} is terminal and immutable",
                id
            )));
        }

        record
            .progress
            .entries
            .push(CycleEntry::note(record.cycle_count, text));
        record.touch();
        self.write_record(&record)
    }

    fn compare_and_set_status(
        &self,
        id: &str,
        expected: RunStatus,
        new: RunStatus,
    ) -> Result<bool> {
        let _guard = self.guard()?;

        let mut record = self
            .read_record(id)?
            .ok_or_else(|| CyclrError::RecordNotFound(id.to_string()))?;

        if record.status != expected {
            return Ok(false);
        }

        record.status = new;
        record.touch();
        self.write_record(&record)?;
        Ok(true)
    }

    fn list_by_status(&self, status: RunStatus) -> Result<Vec<ControlRecord>> {
        let _guard = self.guard()?;

        let mut records = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<ControlRecord>(&content) {
                Ok(record) if record.status == status => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    log::warn!("skipping corrupt record file {}: {}", path.display(), e);
                }
            }
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
