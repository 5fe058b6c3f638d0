//! Global configuration file (`~/.buildref/config.toml`).
//!
//! The global file carries per-user defaults for the `resolve` command so they
//! need not be repeated on every invocation. Every key is optional; flags and
//! environment variables take precedence over the file, and built-in defaults
//! apply when neither sets a value.
//!
//! ```toml
//! image = "registry.example.com/team/$DIR_NAME"
//! parallelism = 8
//! kaniko_binary = "/usr/local/bin/executor"
//! kaniko_args = ["--snapshot-mode=redo"]
//! ```
//!
//! The location can be overridden with `--config` or `BUILDREF_CONFIG`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core::BuildrefError;

/// User-wide defaults for resolution runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Image name template for built artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<i64>,

    /// Dockerfile name relative to each `dockerfile://` path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,

    /// Buildpack builder image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,

    /// Project metadata override file for buildpack builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kaniko_binary: Option<String>,

    /// Extra arguments appended to every kaniko invocation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kaniko_args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_binary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ko_binary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_rev: Option<String>,
}

impl GlobalConfig {
    /// Loads the config from `path`, or from the default location when `None`.
    ///
    /// A missing file yields the defaults.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref()),
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No global config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Loads and parses the config at `path`.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| BuildrefError::ConfigError {
            message: format!("{}: {}", path.display(), e.message()),
        })?;
        tracing::debug!("Loaded global config from {}", path.display());
        Ok(config)
    }

    /// `~/.buildref/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".buildref").join("config.toml"))
    }
}
