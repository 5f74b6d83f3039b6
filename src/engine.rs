use serde::Serialize;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::error::{PortError, Result};
use crate::model::{Field, Record, SlotId, SourceId, State};
use crate::pending::Pending;
use crate::signature::{self, BodySignature};
use crate::tracker::Tracker;
use crate::xref::{self, AnnotationOutcome};

pub const PLACEHOLDER_TITLE: &str = "Deleted or missing record";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Created in the slot matching its id.
    Created,
    /// Created in a later slot because its own slot was taken.
    Renumbered,
    /// Closed dummy filling a gap in the numbering.
    Placeholder,
    /// Slot already held this record from an earlier run; fields re-pushed.
    Reconciled,
    /// Earlier placeholder taken over by a record that now exists.
    Filled,
    /// Slot belongs to someone else.
    Skipped,
    /// Number used up by something that cannot be read, such as a deleted
    /// issue or a discussion. Nothing will ever be created there.
    Vacant,
    /// Slot written by an earlier run with nothing left to push.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotDecision {
    pub slot: SlotId,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<SourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<AnnotationOutcome>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RenumberSummary {
    pub created: usize,
    pub renumbered: usize,
    pub placeholders: usize,
    pub reconciled: usize,
    pub skipped: usize,
    pub annotations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenumberReport {
    pub destination: String,
    pub dry_run: bool,
    pub summary: RenumberSummary,
    pub decisions: Vec<SlotDecision>,
}

impl RenumberReport {
    fn new(config: &RunConfig) -> Self {
        Self {
            destination: config.destination.clone(),
            dry_run: config.dry_run,
            summary: RenumberSummary::default(),
            decisions: Vec::new(),
        }
    }

    fn record(&mut self, decision: SlotDecision) {
        info!(
            slot = decision.slot,
            action = ?decision.action,
            source_id = decision.source_id,
            "slot decision"
        );
        let summary = &mut self.summary;
        match decision.action {
            Action::Created => summary.created += 1,
            Action::Renumbered => summary.renumbered += 1,
            Action::Placeholder => summary.placeholders += 1,
            Action::Reconciled | Action::Filled => summary.reconciled += 1,
            Action::Skipped | Action::Vacant | Action::Unchanged => summary.skipped += 1,
        }
        if matches!(
            decision.annotation,
            Some(AnnotationOutcome::Added | AnnotationOutcome::Updated)
        ) {
            summary.annotations += 1;
        }
        self.decisions.push(decision);
    }
}

/// The body a record is written with: its own body followed by the marker
/// that identifies it on later runs.
pub fn stamped(id: SourceId, record: &Record) -> Record {
    let mut out = record.clone();
    if signature::parse_body(&out.body) != Some(BodySignature::Imported(id)) {
        let body = out.body.trim_end();
        out.body = if body.is_empty() {
            signature::imported_marker(id)
        } else {
            format!("{body}\n\n{}", signature::imported_marker(id))
        };
    }
    out
}

pub fn placeholder_record() -> Record {
    Record {
        title: PLACEHOLDER_TITLE.to_string(),
        body: signature::placeholder_marker(),
        state: State::Closed,
        ..Record::default()
    }
}

/// Create a record and push its full field set, since new issues always
/// start open and unassigned.
fn create_and_update<T: Tracker + ?Sized>(tracker: &T, record: &Record) -> Result<SlotId> {
    let slot = tracker.create(record, Field::FULL)?;
    tracker.update(slot, record, Field::FULL)?;
    Ok(slot)
}

/// Like [`create_and_update`], for records that must land in `slot` exactly.
/// Anything else means the destination changed under us, so the run stops
/// before writing to the wrong slot.
fn create_in_place<T: Tracker + ?Sized>(
    tracker: &T,
    record: &Record,
    slot: SlotId,
) -> Result<SlotId> {
    let assigned = tracker.create(record, Field::FULL)?;
    if assigned != slot {
        return Err(PortError::SlotMismatch {
            expected: slot,
            actual: assigned,
        });
    }
    tracker.update(slot, record, Field::FULL)?;
    Ok(slot)
}

/// Leave a move note on slot `original`, provided that slot exists to
/// carry it.
fn cross_reference<T: Tracker + ?Sized>(
    tracker: &T,
    original: SourceId,
    slot: SlotId,
) -> Result<Option<AnnotationOutcome>> {
    if original == slot {
        return Ok(None);
    }
    if tracker.fetch(original)?.is_none() {
        warn!(
            original,
            slot, "record moved but its original slot does not exist; no note written"
        );
        return Ok(None);
    }
    xref::annotate_move(tracker, original, slot).map(Some)
}

/// Place every pending record in a destination slot.
///
/// Slots are visited in order from 1. The destination can only append, so
/// each empty slot gets the record whose id matches it, a closed placeholder
/// when the next id is further ahead, or the smallest pending record whose
/// own slot was already taken. That last case is a renumbering and leaves a
/// move note on the original slot.
///
/// Every decision is recomputed from what the destination shows, so an
/// aborted run is resumed by rerunning with the full export. Any destination
/// error aborts the run.
pub fn renumber<T: Tracker + ?Sized>(
    tracker: &T,
    mut pending: Pending,
    config: &RunConfig,
) -> Result<RenumberReport> {
    let mut report = RenumberReport::new(config);
    info!(
        destination = %tracker.describe(),
        records = pending.len(),
        mode = config.mode(),
        "renumbering"
    );

    let mut slot: SlotId = 1;
    while !pending.is_empty() {
        let decision = match tracker.fetch(slot)? {
            Some(issue) => match signature::parse_body(&issue.record.body) {
                Some(BodySignature::Imported(original)) => match pending.pop(original) {
                    Some(record) => {
                        tracker.update(slot, &stamped(original, &record), Field::FULL)?;
                        SlotDecision {
                            slot,
                            action: Action::Reconciled,
                            source_id: Some(original),
                            annotation: cross_reference(tracker, original, slot)?,
                        }
                    }
                    None => SlotDecision {
                        slot,
                        action: Action::Unchanged,
                        source_id: Some(original),
                        annotation: None,
                    },
                },
                Some(BodySignature::Placeholder) => match pending.pop(slot) {
                    Some(record) => {
                        tracker.update(slot, &stamped(slot, &record), Field::FULL)?;
                        SlotDecision {
                            slot,
                            action: Action::Filled,
                            source_id: Some(slot),
                            annotation: None,
                        }
                    }
                    None => SlotDecision {
                        slot,
                        action: Action::Unchanged,
                        source_id: None,
                        annotation: None,
                    },
                },
                None => SlotDecision {
                    slot,
                    action: Action::Skipped,
                    source_id: None,
                    annotation: None,
                },
            },
            None if slot <= tracker.last_slot()? => SlotDecision {
                slot,
                action: Action::Vacant,
                source_id: None,
                annotation: None,
            },
            None => fill_empty_slot(tracker, &mut pending, slot)?,
        };
        report.record(decision);
        slot += 1;
    }

    Ok(report)
}

fn fill_empty_slot<T: Tracker + ?Sized>(
    tracker: &T,
    pending: &mut Pending,
    slot: SlotId,
) -> Result<SlotDecision> {
    if let Some(record) = pending.pop(slot) {
        create_in_place(tracker, &stamped(slot, &record), slot)?;
        return Ok(SlotDecision {
            slot,
            action: Action::Created,
            source_id: Some(slot),
            annotation: None,
        });
    }

    // The smallest pending id, if its own slot has already gone by.
    let overdue = pending
        .first_id()
        .filter(|first| *first <= slot)
        .and_then(|first| pending.pop(first).map(|record| (first, record)));

    let Some((first, record)) = overdue else {
        create_in_place(tracker, &placeholder_record(), slot)?;
        return Ok(SlotDecision {
            slot,
            action: Action::Placeholder,
            source_id: None,
            annotation: None,
        });
    };

    let assigned = create_and_update(tracker, &stamped(first, &record))?;
    Ok(SlotDecision {
        slot: assigned,
        action: Action::Renumbered,
        source_id: Some(first),
        annotation: cross_reference(tracker, first, assigned)?,
    })
}
