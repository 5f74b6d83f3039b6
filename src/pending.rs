use std::collections::BTreeMap;

use crate::error::{PortError, Result};
use crate::model::{Record, SourceId};

/// Translated records that have not been placed in a destination slot yet.
///
/// Keys are unique and the mapping only ever shrinks: each source id is
/// handed out at most once per run.
#[derive(Debug, Default)]
pub struct Pending {
    records: BTreeMap<SourceId, Record>,
}

impl Pending {
    /// Build the mapping, rejecting duplicate or zero ids.
    pub fn new(records: impl IntoIterator<Item = (SourceId, Record)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (id, record) in records {
            if id == 0 {
                return Err(PortError::InvalidExport(
                    "record ids must be positive integers".into(),
                ));
            }
            if map.insert(id, record).is_some() {
                return Err(PortError::InvalidExport(format!("duplicate record id {id}")));
            }
        }
        Ok(Self { records: map })
    }

    /// Smallest remaining source id.
    pub fn first_id(&self) -> Option<SourceId> {
        self.records.keys().next().copied()
    }

    pub fn pop(&mut self, id: SourceId) -> Option<Record> {
        self.records.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
