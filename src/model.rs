use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier of a record in the system it was exported from.
pub type SourceId = u64;

/// Numbered position in a destination tracker, starting at 1.
pub type SlotId = u64;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    #[default]
    Open,
    Closed,
}

/// Mutable fields a destination call is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Body,
    State,
    Labels,
    Assignees,
}

impl Field {
    /// Allow-list for creates and full updates.
    pub const FULL: &'static [Field] = &[
        Field::Title,
        Field::Body,
        Field::State,
        Field::Labels,
        Field::Assignees,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Body => "body",
            Self::State => "state",
            Self::Labels => "labels",
            Self::Assignees => "assignees",
        }
    }
}

/// A destination-shaped record: fixed schema plus an overflow bag for fields
/// the destination reported that this tool does not manage.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub state: State,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A record as it currently sits in a destination slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub number: SlotId,
    #[serde(flatten)]
    pub record: Record,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub body: String,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl Record {
    /// Trim and drop empty labels/assignees, then deduplicate and sort for deterministic writes.
    pub fn normalize(&mut self) {
        for list in [&mut self.labels, &mut self.assignees] {
            for item in list.iter_mut() {
                let trimmed = item.trim();
                if trimmed.len() != item.len() {
                    *item = trimmed.to_string();
                }
            }
            list.retain(|item| !item.is_empty());
            list.sort();
            list.dedup();
        }
    }

    /// Project this record onto an allow-list as a JSON object.
    pub fn to_fields(&self, fields: &[Field]) -> serde_json::Map<String, serde_json::Value> {
        let mut out = serde_json::Map::new();
        for field in fields {
            let value = match field {
                Field::Title => serde_json::Value::from(self.title.clone()),
                Field::Body => serde_json::Value::from(self.body.clone()),
                Field::State => serde_json::Value::from(self.state.to_string()),
                Field::Labels => serde_json::Value::from(self.labels.clone()),
                Field::Assignees => serde_json::Value::from(self.assignees.clone()),
            };
            out.insert(field.name().to_string(), value);
        }
        out
    }

    /// Overwrite the allow-listed fields of `self` with those of `other`.
    pub fn apply_fields(&mut self, other: &Record, fields: &[Field]) {
        for field in fields {
            match field {
                Field::Title => self.title = other.title.clone(),
                Field::Body => self.body = other.body.clone(),
                Field::State => self.state = other.state,
                Field::Labels => self.labels = other.labels.clone(),
                Field::Assignees => self.assignees = other.assignees.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_omits_empty_collections() {
        let record = Record {
            title: "Crash on save".into(),
            ..Record::default()
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("labels"));
        assert!(!json.contains("assignees"));
        assert!(!json.contains("extra"));
        assert!(json.contains(r#""state":"open""#));
    }

    #[test]
    fn normalize_trims_dedups_and_sorts() {
        let mut record = Record {
            title: "t".into(),
            labels: vec![" bug".into(), "".into(), "bug".into(), "api ".into()],
            assignees: vec!["zed".into(), "amy".into(), "zed".into()],
            ..Record::default()
        };
        record.normalize();
        assert_eq!(record.labels, vec!["api", "bug"]);
        assert_eq!(record.assignees, vec!["amy", "zed"]);
    }

    #[test]
    fn to_fields_respects_allow_list() {
        let record = Record {
            title: "Title".into(),
            body: "Body".into(),
            state: State::Closed,
            labels: vec!["bug".into()],
            ..Record::default()
        };

        let state_only = record.to_fields(&[Field::State]);
        assert_eq!(state_only.len(), 1);
        assert_eq!(state_only["state"], "closed");

        let full = record.to_fields(Field::FULL);
        assert_eq!(full.len(), 5);
        assert_eq!(full["state"], "closed");
        assert_eq!(full["labels"], serde_json::json!(["bug"]));
    }

    #[test]
    fn apply_fields_only_touches_listed_fields() {
        let mut target = Record {
            title: "old".into(),
            body: "old body".into(),
            ..Record::default()
        };
        let source = Record {
            title: "new".into(),
            body: "new body".into(),
            state: State::Closed,
            ..Record::default()
        };

        target.apply_fields(&source, &[Field::State]);
        assert_eq!(target.title, "old");
        assert_eq!(target.state, State::Closed);
    }

    #[test]
    fn issue_flattens_record_fields() {
        let issue: Issue = serde_json::from_str(
            r#"{"number": 3, "title": "x", "body": "y", "state": "closed"}"#,
        )
        .unwrap();
        assert_eq!(issue.number, 3);
        assert_eq!(issue.record.state, State::Closed);
    }
}
