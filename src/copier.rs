use serde::Serialize;
use tracing::info;

use crate::config::RunConfig;
use crate::error::{PortError, Result};
use crate::model::{Field, SlotId, State};
use crate::tracker::Tracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopiedSlot {
    pub slot: SlotId,
    pub action: CopyAction,
    pub state: State,
}

#[derive(Debug, Clone, Serialize)]
pub struct CopyReport {
    pub source: String,
    pub destination: String,
    pub dry_run: bool,
    pub created: usize,
    pub updated: usize,
    pub slots: Vec<CopiedSlot>,
}

/// Replicate `source` onto `dest` slot for slot, without translation or
/// renumbering. Stops at the first source slot that does not exist.
pub fn copy_all<S, D>(source: &S, dest: &D, config: &RunConfig) -> Result<CopyReport>
where
    S: Tracker + ?Sized,
    D: Tracker + ?Sized,
{
    let mut report = CopyReport {
        source: source.describe(),
        destination: config.destination.clone(),
        dry_run: config.dry_run,
        created: 0,
        updated: 0,
        slots: Vec::new(),
    };
    info!(source = %report.source, destination = %dest.describe(), "copying");

    for slot in 1.. {
        let Some(issue) = source.fetch(slot)? else {
            info!(slot, "source exhausted");
            break;
        };
        let record = &issue.record;

        let action = if dest.fetch(slot)?.is_some() {
            dest.update(slot, record, Field::FULL)?;
            report.updated += 1;
            CopyAction::Updated
        } else {
            if slot > 1 && dest.fetch(slot - 1)?.is_none() {
                return Err(PortError::MissingPredecessor(slot - 1));
            }
            let assigned = dest.create(record, Field::FULL)?;
            if assigned != slot {
                return Err(PortError::SlotMismatch {
                    expected: slot,
                    actual: assigned,
                });
            }
            if record.state != State::default() {
                dest.update(slot, record, &[Field::State])?;
            }
            report.created += 1;
            CopyAction::Created
        };

        info!(slot, ?action, "copied");
        report.slots.push(CopiedSlot {
            slot,
            action,
            state: record.state,
        });
    }

    Ok(report)
}
