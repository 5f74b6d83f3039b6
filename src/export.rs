use std::collections::BTreeMap;
use std::fs;
use std::io::Read;

use serde::{Deserialize, Deserializer};

use crate::error::{PortError, Result};
use crate::model::SourceId;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExportDocument {
    #[serde(default)]
    bugs: Vec<Bug>,
}

/// One record of a bug-tracker export, as flat fields.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Bug {
    pub id: SourceId,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub priority: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub version: Option<String>,
    #[serde(default)]
    pub reporter: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default, deserialize_with = "keyword_list")]
    pub keywords: Vec<String>,
    /// The first comment is the bug's description.
    #[serde(default)]
    pub comments: Vec<BugComment>,
    /// Fields the translator does not know about.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BugComment {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// Versions like `1.2` parse as YAML numbers; keep them as written.
fn scalar_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => None,
        Some(serde_yaml::Value::String(text)) => Some(text),
        Some(serde_yaml::Value::Number(number)) => Some(number.to_string()),
        Some(serde_yaml::Value::Bool(flag)) => Some(flag.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a scalar, found {other:?}"
            )));
        }
    })
}

/// Keywords come either as a list or as one comma-separated string.
fn keyword_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Keywords {
        List(Vec<String>),
        Text(String),
    }

    Ok(match Keywords::deserialize(deserializer)? {
        Keywords::List(list) => list,
        Keywords::Text(text) => text
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

/// Load an export from a path, or from stdin when `source` is `-`.
pub fn load(source: &str) -> Result<Vec<Bug>> {
    let raw = read_source(source)?;
    parse(source, &raw)
}

fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut contents = String::new();
        std::io::stdin().read_to_string(&mut contents)?;
        return Ok(contents);
    }

    Ok(fs::read_to_string(source)?)
}

pub fn parse(source: &str, raw: &str) -> Result<Vec<Bug>> {
    if raw.trim().is_empty() {
        return Err(PortError::InvalidExport(format!("source '{source}' is empty")));
    }

    let document: ExportDocument = serde_yaml::from_str(raw).map_err(|err| {
        PortError::InvalidExport(format!("failed to parse '{source}': {err}"))
    })?;

    if document.bugs.is_empty() {
        return Err(PortError::InvalidExport(format!(
            "source '{source}' contains no bugs"
        )));
    }
    Ok(document.bugs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const EXPORT: &str = r#"
bugs:
  - id: 12
    summary: Crash when saving
    status: RESOLVED
    resolution: FIXED
    keywords: crash, regression
    comments:
      - author: alice@example.org
        created: 2003-04-05 10:11:12 +0000
        text: Steps to reproduce.
    votes: 3
  - id: 13
    summary: Typo in menu
    version: 1.2
    keywords: [ui]
"#;

    #[test]
    fn parses_bugs_with_keywords_in_either_form() {
        let bugs = parse("export.yaml", EXPORT).unwrap();

        assert_eq!(bugs.len(), 2);
        assert_eq!(bugs[0].id, 12);
        assert_eq!(bugs[0].keywords, vec!["crash", "regression"]);
        assert_eq!(bugs[0].comments[0].text, "Steps to reproduce.");
        assert_eq!(bugs[1].keywords, vec!["ui"]);
        assert!(bugs[1].status.is_none());
        assert_eq!(bugs[1].version.as_deref(), Some("1.2"));
    }

    #[test]
    fn unknown_fields_are_kept_for_warnings() {
        let bugs = parse("export.yaml", EXPORT).unwrap();
        assert_eq!(bugs[0].extra.keys().collect::<Vec<_>>(), vec!["votes"]);
        assert!(bugs[1].extra.is_empty());
    }

    #[test]
    fn json_exports_parse_too() {
        let bugs = parse("export.json", r#"{"bugs": [{"id": 1, "summary": "x"}]}"#).unwrap();
        assert_eq!(bugs[0].summary, "x");
    }

    #[test]
    fn empty_or_bugless_exports_are_rejected() {
        assert!(matches!(
            parse("e.yaml", "  \n"),
            Err(PortError::InvalidExport(msg)) if msg.contains("empty")
        ));
        assert!(matches!(
            parse("e.yaml", "bugs: []\n"),
            Err(PortError::InvalidExport(msg)) if msg.contains("no bugs")
        ));
        assert!(matches!(
            parse("e.yaml", "bugs:\n  - summary: no id\n"),
            Err(PortError::InvalidExport(_))
        ));
    }

    #[test]
    fn load_reads_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.yaml");
        fs::write(&path, EXPORT).unwrap();

        let bugs = load(path.to_str().unwrap()).unwrap();
        assert_eq!(bugs.len(), 2);
    }
}
