use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::model::{SlotId, SourceId};
use crate::signature;
use crate::tracker::Tracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationOutcome {
    Added,
    Updated,
    Unchanged,
}

/// Ensure slot `original` carries exactly one move note pointing at `slot`.
///
/// Only comments that consist of nothing but a move note count. An existing
/// note for `original` is rewritten in place, so a record that moves again
/// ends up with a single note naming its latest slot.
pub fn annotate_move<T: Tracker + ?Sized>(
    tracker: &T,
    original: SourceId,
    slot: SlotId,
) -> Result<AnnotationOutcome> {
    let text = signature::moved_marker(original, slot);
    let comments = tracker.list_comments(original)?;
    let existing = comments.iter().find(|comment| {
        signature::parse_moved(&comment.body).is_some_and(|note| note.original == original)
    });

    let outcome = match existing {
        Some(comment) if comment.body == text => AnnotationOutcome::Unchanged,
        Some(comment) => {
            tracker.update_comment(original, comment.id, &text)?;
            AnnotationOutcome::Updated
        }
        None => {
            tracker.add_comment(original, &text)?;
            AnnotationOutcome::Added
        }
    };
    debug!(original, slot, ?outcome, "move annotation");
    Ok(outcome)
}
