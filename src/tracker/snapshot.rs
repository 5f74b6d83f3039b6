use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::error::{PortError, Result};
use crate::model::{Comment, Field, Issue, Record, SlotId};
use crate::tracker::Tracker;
use crate::tracker::lock;
use crate::tracker::memory::{MemoryTracker, Snapshot};

/// A [`MemoryTracker`] persisted to a JSON file.
///
/// The file is locked for as long as the tracker is open and rewritten after
/// every successful mutation, so an interrupted run leaves a consistent
/// snapshot behind to resume from.
pub struct SnapshotTracker {
    path: PathBuf,
    memory: MemoryTracker,
    _lock: File,
}

impl SnapshotTracker {
    /// Open (or start) a snapshot. A missing file is an empty tracker.
    pub fn open(path: &Path) -> Result<Self> {
        let lock = lock::acquire_lock(&lock::lock_path_for(path))?;
        let name = format!("local:{}", path.display());

        let memory = if path.exists() {
            let data = fs::read_to_string(path)?;
            let snapshot: Snapshot = serde_json::from_str(&data).map_err(|err| {
                PortError::InvalidConfig(format!(
                    "snapshot '{}' is not valid: {err}",
                    path.display()
                ))
            })?;
            MemoryTracker::from_snapshot(name, snapshot)?
        } else {
            MemoryTracker::new(name)
        };

        Ok(Self {
            path: path.to_path_buf(),
            memory,
            _lock: lock,
        })
    }

    pub fn memory(&self) -> &MemoryTracker {
        &self.memory
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.memory.to_snapshot())?;
        let staging = self
            .path
            .with_extension(format!("{}.staging", Uuid::new_v4().simple()));
        fs::write(&staging, json)?;
        if let Err(err) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }
        debug!(path = %self.path.display(), "snapshot saved");
        Ok(())
    }
}

impl Tracker for SnapshotTracker {
    fn describe(&self) -> String {
        self.memory.describe()
    }

    fn fetch(&self, slot: SlotId) -> Result<Option<Issue>> {
        self.memory.fetch(slot)
    }

    fn last_slot(&self) -> Result<SlotId> {
        self.memory.last_slot()
    }

    fn create(&self, record: &Record, fields: &[Field]) -> Result<SlotId> {
        let slot = self.memory.create(record, fields)?;
        self.save()?;
        Ok(slot)
    }

    fn update(&self, slot: SlotId, record: &Record, fields: &[Field]) -> Result<()> {
        self.memory.update(slot, record, fields)?;
        self.save()
    }

    fn list_comments(&self, slot: SlotId) -> Result<Vec<Comment>> {
        self.memory.list_comments(slot)
    }

    fn add_comment(&self, slot: SlotId, body: &str) -> Result<()> {
        self.memory.add_comment(slot, body)?;
        self.save()
    }

    fn update_comment(&self, slot: SlotId, comment_id: u64, body: &str) -> Result<()> {
        self.memory.update_comment(slot, comment_id, body)?;
        self.save()
    }
}
