use std::sync::LazyLock;

use regex::Regex;

use crate::model::{SlotId, SourceId};

/// Tag version of every marker this tool writes. Markers with any other
/// version are not recognized.
pub const MARKER_VERSION: &str = "v1";

const PLACEHOLDER_TEXT: &str = "placeholder for a deleted or missing record";

static IMPORTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\[trackport:v1\] imported record #(\d+)[ \t\r]*$")
        .expect("valid marker pattern")
});

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\[trackport:v1\] placeholder for a deleted or missing record[ \t\r]*$")
        .expect("valid marker pattern")
});

static MOVED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[trackport:v1\] record (\d+) moved to #(\d+)$")
        .expect("valid marker pattern")
});

/// What a slot's body says about where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySignature {
    Imported(SourceId),
    Placeholder,
}

/// A parsed "record K moved to #N" annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovedNote {
    pub original: SourceId,
    pub slot: SlotId,
}

fn tag() -> String {
    format!("[trackport:{MARKER_VERSION}]")
}

pub fn imported_marker(id: SourceId) -> String {
    format!("{} imported record #{id}", tag())
}

pub fn placeholder_marker() -> String {
    format!("{} {PLACEHOLDER_TEXT}", tag())
}

pub fn moved_marker(original: SourceId, slot: SlotId) -> String {
    format!("{} record {original} moved to #{slot}", tag())
}

/// Classify a record body. The last imported marker wins when a body was
/// edited by hand and carries several.
pub fn parse_body(body: &str) -> Option<BodySignature> {
    if let Some(id) = IMPORTED_RE
        .captures_iter(body)
        .filter_map(|caps| caps[1].parse::<SourceId>().ok())
        .last()
    {
        return Some(BodySignature::Imported(id));
    }
    PLACEHOLDER_RE
        .is_match(body)
        .then_some(BodySignature::Placeholder)
}

/// Parse a move note. The whole comment must be the marker, so a comment
/// that merely quotes one is not taken for ours.
pub fn parse_moved(body: &str) -> Option<MovedNote> {
    let caps = MOVED_RE.captures(body.trim())?;
    Some(MovedNote {
        original: caps[1].parse().ok()?,
        slot: caps[2].parse().ok()?,
    })
}
