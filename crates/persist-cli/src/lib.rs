//! # persist-cli: Life-Cycle Engine CLI
//!
//! Provides the `persist` command-line interface.
//!
//! ## Subcommands
//!
//! - `persist states`: Print the twelve life-cycle states with their codes
//!   and classification flags.
//! - `persist simulate`: Run a YAML event script against a session and
//!   print the state of each object after every step.
//!
//! ```bash
//! persist states --json
//! persist -v simulate scenario.yaml --config persist.yaml
//! ```

pub mod simulate;
pub mod states;

use std::path::Path;

use anyhow::{Context, Result};
use persist_core::PersistenceConfig;

/// Load the session configuration: the YAML file if given, then
/// `PERSIST_*` environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<PersistenceConfig> {
    let base = match path {
        Some(path) => PersistenceConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PersistenceConfig::default(),
    };
    base.apply_env().context("applying PERSIST_* overrides")
}
