pub mod dry_run;
pub mod github;
pub mod lock;
pub mod memory;
pub mod snapshot;

use std::path::PathBuf;

use crate::error::{PortError, Result};
use crate::model::{Comment, Field, Issue, Record, SlotId};

/// A sequentially numbered, append-only issue tracker.
///
/// Every call is a blocking round trip; implementations must not cache
/// between calls. Any unsuccessful response is returned as an error and is
/// fatal to the caller.
pub trait Tracker {
    /// Human-readable coordinates, used in reports and log lines.
    fn describe(&self) -> String;

    /// `Ok(None)` when the slot has never been created.
    fn fetch(&self, slot: SlotId) -> Result<Option<Issue>>;

    /// Highest slot number handed out so far, 0 for an empty tracker. A slot
    /// at or below it that fetches as missing is a used-up number: no create
    /// will ever land there.
    fn last_slot(&self) -> Result<SlotId>;

    /// Append a record, returning the slot number the tracker assigned.
    fn create(&self, record: &Record, fields: &[Field]) -> Result<SlotId>;

    fn update(&self, slot: SlotId, record: &Record, fields: &[Field]) -> Result<()>;

    fn list_comments(&self, slot: SlotId) -> Result<Vec<Comment>>;

    fn add_comment(&self, slot: SlotId, body: &str) -> Result<()>;

    fn update_comment(&self, slot: SlotId, comment_id: u64, body: &str) -> Result<()>;
}

impl<T: Tracker + ?Sized> Tracker for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn fetch(&self, slot: SlotId) -> Result<Option<Issue>> {
        (**self).fetch(slot)
    }

    fn last_slot(&self) -> Result<SlotId> {
        (**self).last_slot()
    }

    fn create(&self, record: &Record, fields: &[Field]) -> Result<SlotId> {
        (**self).create(record, fields)
    }

    fn update(&self, slot: SlotId, record: &Record, fields: &[Field]) -> Result<()> {
        (**self).update(slot, record, fields)
    }

    fn list_comments(&self, slot: SlotId) -> Result<Vec<Comment>> {
        (**self).list_comments(slot)
    }

    fn add_comment(&self, slot: SlotId, body: &str) -> Result<()> {
        (**self).add_comment(slot, body)
    }

    fn update_comment(&self, slot: SlotId, comment_id: u64, body: &str) -> Result<()> {
        (**self).update_comment(slot, comment_id, body)
    }
}

/// Where a tracker lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `owner/name` on a GitHub-compatible REST API.
    Github(String),
    /// JSON snapshot file on disk.
    Local(PathBuf),
}

impl Target {
    pub fn from_args(repo: Option<String>, local: Option<PathBuf>) -> Result<Self> {
        match (repo, local) {
            (Some(repo), None) => {
                let valid = repo
                    .split_once('/')
                    .is_some_and(|(owner, name)| !owner.is_empty() && !name.is_empty())
                    && repo.matches('/').count() == 1;
                if !valid {
                    return Err(PortError::InvalidConfig(format!(
                        "repository '{repo}' must look like owner/name"
                    )));
                }
                Ok(Self::Github(repo))
            }
            (None, Some(path)) => Ok(Self::Local(path)),
            _ => Err(PortError::InvalidConfig(
                "exactly one of a repository or a local snapshot must be given".into(),
            )),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Github(repo) => write!(f, "github:{repo}"),
            Self::Local(path) => write!(f, "local:{}", path.display()),
        }
    }
}

/// API endpoint and credential shared by every remote tracker in a run.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_url: String,
    pub token: Option<String>,
}

/// Open a tracker for `target`. Remote targets require a token.
pub fn open(target: &Target, credentials: &Credentials) -> Result<Box<dyn Tracker>> {
    match target {
        Target::Github(repo) => {
            let token = credentials
                .token
                .clone()
                .filter(|t| !t.trim().is_empty())
                .ok_or(PortError::MissingCredential)?;
            Ok(Box::new(github::GithubTracker::new(
                &credentials.api_url,
                repo,
                token,
            )?))
        }
        Target::Local(path) => Ok(Box::new(snapshot::SnapshotTracker::open(path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_requires_exactly_one_coordinate() {
        assert!(Target::from_args(None, None).is_err());
        assert!(
            Target::from_args(Some("o/r".into()), Some(PathBuf::from("x.json"))).is_err()
        );
        assert_eq!(
            Target::from_args(Some("octo/repo".into()), None).unwrap(),
            Target::Github("octo/repo".into())
        );
    }

    #[test]
    fn target_rejects_malformed_repository() {
        for bad in ["octo", "/repo", "octo/", "a/b/c"] {
            let err = Target::from_args(Some(bad.into()), None).unwrap_err();
            assert!(matches!(err, PortError::InvalidConfig(_)), "{bad}");
        }
    }

    #[test]
    fn open_github_without_token_is_missing_credential() {
        let credentials = Credentials {
            api_url: "https://api.github.com".into(),
            token: Some("  ".into()),
        };
        let err = open(&Target::Github("octo/repo".into()), &credentials)
            .err()
            .unwrap();
        assert!(matches!(err, PortError::MissingCredential));
    }
}
