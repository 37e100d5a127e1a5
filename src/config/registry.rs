//! Service definition source configuration

use serde::Deserialize;
use std::path::PathBuf;

/// Where service definitions come from when no database is configured.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    /// Directory of `*.json` / `*.yaml` automaton definitions
    pub definitions_dir: Option<PathBuf>,
}
