//! # Provider Configuration
//!
//! `PersistenceConfig` collects the switches that shape life-cycle
//! behavior: transaction options, whether commit detaches everything, the
//! surrogate-level restore flag, and the default fetch groups.
//!
//! Sources, in increasing precedence:
//! 1. [`PersistenceConfig::default()`]
//! 2. A YAML document ([`PersistenceConfig::from_yaml_str`] / [`PersistenceConfig::from_path`])
//! 3. Environment variables ([`PersistenceConfig::apply_env`]):
//!    - `PERSIST_OPTIMISTIC`
//!    - `PERSIST_RETAIN_VALUES`
//!    - `PERSIST_RESTORE_VALUES`
//!    - `PERSIST_NONTRANSACTIONAL_READ`
//!    - `PERSIST_NONTRANSACTIONAL_WRITE`
//!    - `PERSIST_DETACH_ALL_ON_COMMIT`

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::{FetchPlan, DEFAULT_FETCH_GROUP};
use crate::transaction::TransactionOptions;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid boolean for {var}: {value:?}")]
    InvalidBool { var: String, value: String },
}

/// Life-cycle configuration for a persistence session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Options applied to every transaction the session opens.
    pub transaction: TransactionOptions,
    /// Commit detaches every enlisted object, which also makes new and
    /// dirty objects eligible for make-transient.
    pub detach_all_on_commit: bool,
    /// Surrogate-level restore flag, honored by transient-dirty rollback in
    /// addition to the transaction's own flag.
    pub restore_values: bool,
    /// Fetch groups forming the session's default fetch plan.
    pub fetch_groups: BTreeSet<String>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            transaction: TransactionOptions::default(),
            detach_all_on_commit: false,
            restore_values: false,
            fetch_groups: BTreeSet::from([DEFAULT_FETCH_GROUP.to_string()]),
        }
    }
}

impl PersistenceConfig {
    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Read and parse a YAML file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Override fields from `PERSIST_*` environment variables.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Override fields from an arbitrary variable lookup.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |var: &str, current: bool| -> Result<bool, ConfigError> {
            match lookup(var) {
                Some(raw) => parse_bool(var, &raw),
                None => Ok(current),
            }
        };

        let tx = &mut self.transaction;
        tx.optimistic = flag("PERSIST_OPTIMISTIC", tx.optimistic)?;
        tx.retain_values = flag("PERSIST_RETAIN_VALUES", tx.retain_values)?;
        tx.restore_values = flag("PERSIST_RESTORE_VALUES", tx.restore_values)?;
        tx.nontransactional_read = flag("PERSIST_NONTRANSACTIONAL_READ", tx.nontransactional_read)?;
        tx.nontransactional_write =
            flag("PERSIST_NONTRANSACTIONAL_WRITE", tx.nontransactional_write)?;
        self.detach_all_on_commit = flag("PERSIST_DETACH_ALL_ON_COMMIT", self.detach_all_on_commit)?;
        Ok(self)
    }

    /// The session's default fetch plan.
    pub fn fetch_plan(&self) -> FetchPlan {
        FetchPlan::with_groups(self.fetch_groups.iter().cloned())
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var: var.to_string(),
            value: raw.to_string(),
        }),
    }
}
