//! Per-project file (`.buildref.yaml`) read by `buildref package`.
//!
//! The file sits at the root of the source directory and names the inputs to
//! resolve, so a project can be packaged without repeating its flags:
//!
//! ```yaml
//! filename: [config/]
//! recursive: true
//! image: registry.example.com/team/$DIR_NAME
//! ```
//!
//! Paths are relative to the directory holding the file. Flags win over the
//! project file, which wins over the global config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::constants::PROJECT_FILE;
use crate::core::BuildrefError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectConfig {
    /// Files or directories to resolve.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filename: Vec<String>,

    #[serde(default)]
    pub recursive: bool,

    /// Output directory; the project directory itself when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    #[serde(default)]
    pub flatten_output: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<String>,
}

impl ProjectConfig {
    /// Loads `.buildref.yaml` from `directory`. A missing file yields the
    /// defaults.
    pub async fn load(directory: &Path) -> Result<Self> {
        let path = directory.join(PROJECT_FILE);
        if !path.exists() {
            tracing::debug!("No project file at {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read project file {}", path.display()))?;
        // An empty file is an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&content).map_err(|e| BuildrefError::ConfigError {
            message: format!("{}: {}", path.display(), e),
        })?;
        tracing::debug!("Loaded project file {}", path.display());
        Ok(config)
    }
}
