use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PortError, Result};

pub const DEFAULT_GRACE_SECS: u64 = 5;

/// Settings for one run. Built once from the command line and only ever
/// passed by reference afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Human-readable destination, e.g. `github:owner/name`.
    pub destination: String,
    /// When set, no mutating call reaches the destination.
    pub dry_run: bool,
    /// Pause before the first mutating call of a forced run.
    pub grace: Duration,
}

impl RunConfig {
    pub fn new(destination: impl Into<String>, force: bool, grace_secs: u64) -> Self {
        Self {
            destination: destination.into(),
            dry_run: !force,
            grace: Duration::from_secs(grace_secs),
        }
    }

    pub fn mode(&self) -> &'static str {
        if self.dry_run { "dry run" } else { "apply" }
    }
}

/// Operator overrides for the translation tables, read from `--tables`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Tables {
    /// Source login -> destination login.
    #[serde(default)]
    pub users: BTreeMap<String, String>,
    /// Source component -> destination label.
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    /// Labels added to every migrated record.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Tables {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::parse(&data).map_err(|err| {
            PortError::InvalidConfig(format!("tables file '{}': {err}", path.display()))
        })
    }

    fn parse(data: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(data)
    }
}
