use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use colored::Colorize;
use tracing::info;

use crate::error::Result;
use crate::model::{Comment, Field, Issue, Record, SlotId, State};
use crate::tracker::Tracker;

/// Wraps a tracker so that reads go through and writes become no-ops.
///
/// Creates are simulated so the caller can keep making decisions. Each one
/// is assigned the number after the tracker's last slot, and later fetches
/// of that number return the simulated record.
pub struct DryRun<T> {
    inner: T,
    simulated: RefCell<BTreeMap<SlotId, Record>>,
    notices: RefCell<Vec<String>>,
    skipped: Cell<usize>,
}

impl<T: Tracker> DryRun<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            simulated: RefCell::new(BTreeMap::new()),
            notices: RefCell::new(Vec::new()),
            skipped: Cell::new(0),
        }
    }

    /// Number of mutating calls that were skipped.
    pub fn skipped(&self) -> usize {
        self.skipped.get()
    }

    /// Operator notices emitted so far (at most one per run).
    pub fn notices(&self) -> Vec<String> {
        self.notices.borrow().clone()
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn skip(&self, operation: &str, slot: Option<SlotId>) {
        self.skipped.set(self.skipped.get() + 1);
        let target = slot.map(|s| format!(" #{s}")).unwrap_or_default();
        info!(operation, slot, "dry run: skipped");

        if self.notices.borrow().is_empty() {
            let notice = format!(
                "dry run: skipping {operation}{target} on {} and every later change \
                 (pass --force to apply)",
                self.inner.describe()
            );
            eprintln!("{}", notice.yellow());
            self.notices.borrow_mut().push(notice);
        }
    }
}

impl<T: Tracker> Tracker for DryRun<T> {
    fn describe(&self) -> String {
        format!("{} (dry run)", self.inner.describe())
    }

    fn fetch(&self, slot: SlotId) -> Result<Option<Issue>> {
        if let Some(record) = self.simulated.borrow().get(&slot) {
            return Ok(Some(Issue {
                number: slot,
                record: record.clone(),
            }));
        }

        self.inner.fetch(slot)
    }

    fn last_slot(&self) -> Result<SlotId> {
        let simulated = self.simulated.borrow().keys().next_back().copied();
        Ok(self.inner.last_slot()?.max(simulated.unwrap_or(0)))
    }

    fn create(&self, record: &Record, fields: &[Field]) -> Result<SlotId> {
        let slot = self.last_slot()? + 1;
        self.skip("create", None);

        let mut stored = Record::default();
        stored.apply_fields(record, fields);
        stored.state = State::Open;
        self.simulated.borrow_mut().insert(slot, stored);
        Ok(slot)
    }

    fn update(&self, slot: SlotId, record: &Record, fields: &[Field]) -> Result<()> {
        self.skip("update", Some(slot));
        if let Some(stored) = self.simulated.borrow_mut().get_mut(&slot) {
            stored.apply_fields(record, fields);
        }
        Ok(())
    }

    fn list_comments(&self, slot: SlotId) -> Result<Vec<Comment>> {
        if self.simulated.borrow().contains_key(&slot) {
            return Ok(Vec::new());
        }
        self.inner.list_comments(slot)
    }

    fn add_comment(&self, slot: SlotId, _body: &str) -> Result<()> {
        self.skip("comment", Some(slot));
        Ok(())
    }

    fn update_comment(&self, slot: SlotId, _comment_id: u64, _body: &str) -> Result<()> {
        self.skip("comment update", Some(slot));
        Ok(())
    }
}
