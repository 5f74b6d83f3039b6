use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use crate::config::Tables;
use crate::export::{Bug, BugComment};
use crate::model::{Record, SourceId, State};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

#[derive(Debug, Default)]
pub struct Translation {
    pub records: Vec<(SourceId, Record)>,
    pub warnings: Vec<String>,
}

struct Warnings<'a> {
    id: SourceId,
    out: &'a mut Vec<String>,
}

impl Warnings<'_> {
    fn push(&mut self, message: String) {
        warn!(bug = self.id, "{message}");
        self.out.push(format!("bug {}: {message}", self.id));
    }
}

/// Map exported bugs onto destination records. Values the tables do not
/// know are reported as warnings and dropped; the record is still migrated.
pub fn translate_all(bugs: &[Bug], tables: &Tables) -> Translation {
    let mut translation = Translation::default();
    for bug in bugs {
        let mut warnings = Warnings {
            id: bug.id,
            out: &mut translation.warnings,
        };
        let record = translate(bug, tables, &mut warnings);
        translation.records.push((bug.id, record));
    }
    translation
}

fn translate(bug: &Bug, tables: &Tables, warnings: &mut Warnings<'_>) -> Record {
    for key in bug.extra.keys() {
        warnings.push(format!("ignoring unknown field '{key}'"));
    }

    let title = match bug.summary.trim() {
        "" => {
            warnings.push("empty summary".into());
            format!("Bug {}", bug.id)
        }
        summary => summary.to_string(),
    };

    let mut labels = tables.labels.clone();
    labels.extend(resolution_label(bug.resolution.as_deref(), warnings));
    labels.extend(severity_label(bug.severity.as_deref(), warnings));
    labels.extend(priority_label(bug.priority.as_deref(), warnings));
    labels.extend(component_label(bug.component.as_deref(), tables));
    labels.extend(bug.keywords.iter().cloned());

    let mut record = Record {
        title,
        body: render_body(bug, tables, warnings),
        state: state_for(bug.status.as_deref(), warnings),
        labels,
        assignees: assignee(bug.assigned_to.as_deref(), tables, warnings)
            .into_iter()
            .collect(),
        ..Record::default()
    };
    record.normalize();
    record
}

fn state_for(status: Option<&str>, warnings: &mut Warnings<'_>) -> State {
    let Some(status) = status.map(str::trim).filter(|s| !s.is_empty()) else {
        return State::Open;
    };
    match status.to_ascii_uppercase().as_str() {
        "UNCONFIRMED" | "NEW" | "ASSIGNED" | "REOPENED" | "IN_PROGRESS" | "CONFIRMED" => {
            State::Open
        }
        "RESOLVED" | "VERIFIED" | "CLOSED" => State::Closed,
        _ => {
            warnings.push(format!("unknown status '{status}', treating as open"));
            State::Open
        }
    }
}

fn resolution_label(resolution: Option<&str>, warnings: &mut Warnings<'_>) -> Option<String> {
    let resolution = resolution.map(str::trim).filter(|r| !r.is_empty())?;
    match resolution.to_ascii_uppercase().as_str() {
        "FIXED" => None,
        "INVALID" | "WONTFIX" | "DUPLICATE" | "WORKSFORME" | "INCOMPLETE" | "MOVED" => {
            Some(resolution.to_ascii_lowercase())
        }
        _ => {
            warnings.push(format!("unknown resolution '{resolution}'"));
            None
        }
    }
}

fn severity_label(severity: Option<&str>, warnings: &mut Warnings<'_>) -> Option<String> {
    let severity = severity.map(str::trim).filter(|s| !s.is_empty())?;
    let lower = severity.to_ascii_lowercase();
    match lower.as_str() {
        "normal" => None,
        "enhancement" => Some(lower),
        "blocker" | "critical" | "major" | "minor" | "trivial" => {
            Some(format!("severity:{lower}"))
        }
        _ => {
            warnings.push(format!("unknown severity '{severity}'"));
            None
        }
    }
}

fn priority_label(priority: Option<&str>, warnings: &mut Warnings<'_>) -> Option<String> {
    let priority = priority.map(str::trim).filter(|p| !p.is_empty() && *p != "--")?;
    match priority.to_ascii_uppercase().as_str() {
        level @ ("P1" | "P2" | "P3" | "P4" | "P5") => {
            Some(format!("priority:{}", level.to_ascii_lowercase()))
        }
        _ => {
            warnings.push(format!("unknown priority '{priority}'"));
            None
        }
    }
}

fn component_label(component: Option<&str>, tables: &Tables) -> Option<String> {
    let component = component.map(str::trim).filter(|c| !c.is_empty())?;
    Some(match tables.components.get(component) {
        Some(label) => label.clone(),
        None => format!("component:{}", component.to_lowercase()),
    })
}

fn is_nobody(login: &str) -> bool {
    login.is_empty() || login == "nobody" || login.starts_with("nobody@")
}

fn assignee(login: Option<&str>, tables: &Tables, warnings: &mut Warnings<'_>) -> Option<String> {
    let login = login.map(str::trim).filter(|l| !is_nobody(l))?;
    let mapped = tables.users.get(login).cloned();
    if mapped.is_none() {
        warnings.push(format!("no destination user for assignee '{login}'"));
    }
    mapped
}

/// Reporters and commenters are shown by destination login when known.
fn display_user(login: Option<&str>, tables: &Tables) -> String {
    match login.map(str::trim).filter(|l| !l.is_empty()) {
        Some(login) => match tables.users.get(login) {
            Some(user) => format!("@{user}"),
            None => login.to_string(),
        },
        None => "unknown".to_string(),
    }
}

/// Normalize a timestamp to UTC minutes. Unparseable values are kept as is.
fn timestamp(raw: Option<&str>, warnings: &mut Warnings<'_>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string());
    }
    for format in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M %z"] {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Some(parsed.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string());
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc().format(TIMESTAMP_FORMAT).to_string());
        }
    }
    warnings.push(format!("unrecognized timestamp '{raw}'"));
    Some(raw.to_string())
}

fn quote(text: &str) -> String {
    text.trim_end()
        .lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_body(bug: &Bug, tables: &Tables, warnings: &mut Warnings<'_>) -> String {
    let mut header = format!(
        "Originally reported by {}",
        display_user(bug.reporter.as_deref(), tables)
    );
    if let Some(created) = timestamp(bug.created.as_deref(), warnings) {
        header.push_str(&format!(" on {created}"));
    }
    if let Some(version) = bug.version.as_deref().filter(|v| !v.trim().is_empty()) {
        header.push_str(&format!(" (version {})", version.trim()));
    }
    header.push('.');

    let mut sections = vec![header];
    let mut comments = bug.comments.iter();
    if let Some(description) = comments.next() {
        let text = description.text.trim();
        if !text.is_empty() {
            sections.push(text.to_string());
        }
    }
    for comment in comments {
        sections.push(render_comment(comment, tables, warnings));
    }
    sections.join("\n\n")
}

fn render_comment(comment: &BugComment, tables: &Tables, warnings: &mut Warnings<'_>) -> String {
    let mut heading = format!(
        "Comment by {}",
        display_user(comment.author.as_deref(), tables)
    );
    if let Some(created) = timestamp(comment.created.as_deref(), warnings) {
        heading.push_str(&format!(" on {created}"));
    }
    format!("---\n{heading}:\n\n{}", quote(&comment.text))
}
