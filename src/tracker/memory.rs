use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PortError, Result};
use crate::model::{Comment, Field, Issue, Record, SlotId, State};
use crate::tracker::Tracker;

/// One call made against a [`MemoryTracker`], in issue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Fetch(SlotId),
    /// Carries the slot the create was assigned (or would have been).
    Create(SlotId),
    Update(SlotId),
    ListComments(SlotId),
    AddComment(SlotId),
    UpdateComment(SlotId),
}

impl Call {
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::Create(_) | Self::Update(_) | Self::AddComment(_) | Self::UpdateComment(_)
        )
    }

    fn operation(self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Create(_) => "create",
            Self::Update(_) => "update",
            Self::ListComments(_) => "list comments",
            Self::AddComment(_) => "add comment",
            Self::UpdateComment(_) => "update comment",
        }
    }

    fn slot(self) -> SlotId {
        match self {
            Self::Fetch(s)
            | Self::Create(s)
            | Self::Update(s)
            | Self::ListComments(s)
            | Self::AddComment(s)
            | Self::UpdateComment(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct StoredIssue {
    #[serde(flatten)]
    record: Record,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    comments: Vec<Comment>,
}

/// On-disk form of a [`MemoryTracker`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    next_slot: Option<SlotId>,
    #[serde(default)]
    issues: Vec<SnapshotIssue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotIssue {
    number: SlotId,
    #[serde(flatten)]
    stored: StoredIssue,
}

/// Simulated destination tracker.
///
/// Slot numbers are handed out sequentially and never reused, even after
/// [`MemoryTracker::remove`], matching how hosted trackers behave.
#[derive(Debug)]
pub struct MemoryTracker {
    name: String,
    slots: RefCell<BTreeMap<SlotId, StoredIssue>>,
    next_slot: Cell<SlotId>,
    next_comment_id: Cell<u64>,
    calls: RefCell<Vec<Call>>,
    rejections: RefCell<Vec<Call>>,
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryTracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: RefCell::new(BTreeMap::new()),
            next_slot: Cell::new(1),
            next_comment_id: Cell::new(1),
            calls: RefCell::new(Vec::new()),
            rejections: RefCell::new(Vec::new()),
        }
    }

    /// Append a record as an outside writer would. Not recorded as a call.
    pub fn push(&self, record: Record) -> SlotId {
        let slot = self.next_slot.get();
        self.next_slot.set(slot + 1);
        self.slots.borrow_mut().insert(
            slot,
            StoredIssue {
                record,
                comments: Vec::new(),
            },
        );
        slot
    }

    /// Delete a slot. Its number is not handed out again.
    pub fn remove(&self, slot: SlotId) {
        self.slots.borrow_mut().remove(&slot);
    }

    /// Make the next matching call fail with an HTTP 422.
    pub fn reject(&self, call: Call) {
        self.rejections.borrow_mut().push(call);
    }

    pub fn issue(&self, slot: SlotId) -> Option<Issue> {
        self.slots.borrow().get(&slot).map(|stored| Issue {
            number: slot,
            record: stored.record.clone(),
        })
    }

    pub fn comments(&self, slot: SlotId) -> Vec<Comment> {
        self.slots
            .borrow()
            .get(&slot)
            .map(|stored| stored.comments.clone())
            .unwrap_or_default()
    }

    pub fn slot_ids(&self) -> Vec<SlotId> {
        self.slots.borrow().keys().copied().collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .copied()
            .filter(|call| call.is_mutating())
            .collect()
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            next_slot: Some(self.next_slot.get()),
            issues: self
                .slots
                .borrow()
                .iter()
                .map(|(number, stored)| SnapshotIssue {
                    number: *number,
                    stored: stored.clone(),
                })
                .collect(),
        }
    }

    pub fn from_snapshot(name: impl Into<String>, snapshot: Snapshot) -> Result<Self> {
        let tracker = Self::new(name);
        let mut max_slot = 0;
        let mut max_comment = 0;
        {
            let mut slots = tracker.slots.borrow_mut();
            for issue in snapshot.issues {
                if issue.number == 0 {
                    return Err(PortError::InvalidConfig(
                        "snapshot issue numbers must start at 1".into(),
                    ));
                }
                max_slot = max_slot.max(issue.number);
                for comment in &issue.stored.comments {
                    max_comment = max_comment.max(comment.id);
                }
                if slots.insert(issue.number, issue.stored).is_some() {
                    return Err(PortError::InvalidConfig(format!(
                        "snapshot contains issue #{} twice",
                        issue.number
                    )));
                }
            }
        }
        let next_slot = snapshot.next_slot.unwrap_or(max_slot + 1).max(max_slot + 1);
        tracker.next_slot.set(next_slot);
        tracker.next_comment_id.set(max_comment + 1);
        Ok(tracker)
    }

    fn record_call(&self, call: Call) -> Result<()> {
        debug!(
            operation = call.operation(),
            slot = call.slot(),
            tracker = %self.name,
            "tracker call"
        );
        self.calls.borrow_mut().push(call);
        let mut rejections = self.rejections.borrow_mut();
        if let Some(pos) = rejections.iter().position(|r| *r == call) {
            rejections.remove(pos);
            return Err(PortError::Api {
                operation: call.operation(),
                slot: Some(call.slot()),
                status: 422,
                message: "rejected by simulated tracker".into(),
            });
        }
        Ok(())
    }

    fn not_found(operation: &'static str, slot: SlotId) -> PortError {
        PortError::Api {
            operation,
            slot: Some(slot),
            status: 404,
            message: "Not Found".into(),
        }
    }
}

impl Tracker for MemoryTracker {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn fetch(&self, slot: SlotId) -> Result<Option<Issue>> {
        self.record_call(Call::Fetch(slot))?;
        Ok(self.issue(slot))
    }

    fn last_slot(&self) -> Result<SlotId> {
        let last = self.next_slot.get() - 1;
        debug!(operation = "last slot", slot = last, tracker = %self.name, "tracker call");
        Ok(last)
    }

    fn create(&self, record: &Record, fields: &[Field]) -> Result<SlotId> {
        self.record_call(Call::Create(self.next_slot.get()))?;
        let mut stored = Record::default();
        stored.apply_fields(record, fields);
        // New issues always start open.
        stored.state = State::Open;
        Ok(self.push(stored))
    }

    fn update(&self, slot: SlotId, record: &Record, fields: &[Field]) -> Result<()> {
        self.record_call(Call::Update(slot))?;
        let mut slots = self.slots.borrow_mut();
        let stored = slots
            .get_mut(&slot)
            .ok_or_else(|| Self::not_found("update", slot))?;
        stored.record.apply_fields(record, fields);
        Ok(())
    }

    fn list_comments(&self, slot: SlotId) -> Result<Vec<Comment>> {
        self.record_call(Call::ListComments(slot))?;
        self.slots
            .borrow()
            .get(&slot)
            .map(|stored| stored.comments.clone())
            .ok_or_else(|| Self::not_found("list comments", slot))
    }

    fn add_comment(&self, slot: SlotId, body: &str) -> Result<()> {
        self.record_call(Call::AddComment(slot))?;
        let mut slots = self.slots.borrow_mut();
        let stored = slots
            .get_mut(&slot)
            .ok_or_else(|| Self::not_found("add comment", slot))?;
        let id = self.next_comment_id.get();
        self.next_comment_id.set(id + 1);
        stored.comments.push(Comment {
            id,
            body: body.to_string(),
        });
        Ok(())
    }

    fn update_comment(&self, slot: SlotId, comment_id: u64, body: &str) -> Result<()> {
        self.record_call(Call::UpdateComment(slot))?;
        let mut slots = self.slots.borrow_mut();
        let comment = slots
            .get_mut(&slot)
            .and_then(|stored| stored.comments.iter_mut().find(|c| c.id == comment_id))
            .ok_or_else(|| Self::not_found("update comment", slot))?;
        comment.body = body.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn record(title: &str) -> Record {
        Record {
            title: title.into(),
            body: format!("{title} body"),
            state: State::Closed,
            ..Record::default()
        }
    }

    #[test]
    fn create_appends_and_starts_open() {
        let tracker = MemoryTracker::default();
        tracker.push(record("existing"));

        let slot = tracker.create(&record("new"), Field::FULL).unwrap();
        assert_eq!(slot, 2);
        let issue = tracker.fetch(2).unwrap().unwrap();
        assert_eq!(issue.record.title, "new");
        assert_eq!(issue.record.state, State::Open);
        assert!(tracker.fetch(3).unwrap().is_none());
    }

    #[test]
    fn removed_slots_are_not_reused() {
        let tracker = MemoryTracker::default();
        tracker.push(record("a"));
        tracker.push(record("b"));
        tracker.remove(2);

        assert!(tracker.fetch(2).unwrap().is_none());
        assert_eq!(tracker.create(&record("c"), Field::FULL).unwrap(), 3);
    }

    #[test]
    fn last_slot_counts_removed_numbers() {
        let tracker = MemoryTracker::default();
        assert_eq!(tracker.last_slot().unwrap(), 0);
        tracker.push(record("a"));
        tracker.push(record("b"));
        tracker.remove(2);

        assert_eq!(tracker.last_slot().unwrap(), 2);
        assert!(tracker.fetch(2).unwrap().is_none());
    }

    #[test]
    fn every_call_is_logged_with_operation_and_slot() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();

        let tracker = MemoryTracker::default();
        tracker.push(record("a"));
        tracing::subscriber::with_default(subscriber, || {
            tracker.fetch(1).unwrap();
            tracker.add_comment(1, "note").unwrap();
        });

        let logged = captured.contents();
        assert!(logged.contains("DEBUG"), "{logged}");
        assert!(logged.contains("operation=\"fetch\" slot=1"), "{logged}");
        assert!(logged.contains("operation=\"add comment\" slot=1"), "{logged}");
    }

    #[test]
    fn rejected_call_fails_once_with_api_error() {
        let tracker = MemoryTracker::default();
        tracker.push(record("a"));
        tracker.reject(Call::Update(1));

        let err = tracker.update(1, &record("b"), Field::FULL).unwrap_err();
        assert!(matches!(err, PortError::Api { status: 422, slot: Some(1), .. }));
        tracker.update(1, &record("b"), Field::FULL).unwrap();
        assert_eq!(tracker.issue(1).unwrap().record.title, "b");
    }

    #[test]
    fn comments_get_stable_ids_and_update_in_place() {
        let tracker = MemoryTracker::default();
        tracker.push(record("a"));
        tracker.add_comment(1, "first").unwrap();
        tracker.add_comment(1, "second").unwrap();

        let comments = tracker.list_comments(1).unwrap();
        assert_eq!(comments.len(), 2);
        tracker.update_comment(1, comments[0].id, "edited").unwrap();
        assert_eq!(tracker.comments(1)[0].body, "edited");
        assert!(tracker.add_comment(9, "nowhere").is_err());
    }

    #[test]
    fn snapshot_preserves_numbering_and_comment_ids() {
        let tracker = MemoryTracker::default();
        tracker.push(record("a"));
        tracker.push(record("b"));
        tracker.add_comment(2, "note").unwrap();
        tracker.remove(2);
        tracker.push(record("c"));

        let json = serde_json::to_string(&tracker.to_snapshot()).unwrap();
        let restored =
            MemoryTracker::from_snapshot("restored", serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.slot_ids(), vec![1, 3]);
        assert_eq!(restored.create(&record("d"), Field::FULL).unwrap(), 4);
    }

    #[test]
    fn snapshot_rejects_duplicate_numbers() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{"issues": [{"number": 1, "title": "a"}, {"number": 1, "title": "b"}]}"#,
        )
        .unwrap();
        let err = MemoryTracker::from_snapshot("dup", snapshot).unwrap_err();
        assert!(matches!(err, PortError::InvalidConfig(msg) if msg.contains("#1 twice")));
    }
}
