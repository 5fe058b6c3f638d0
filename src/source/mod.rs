//! Source context shared by every build of a run.
//!
//! A run builds from one source: either a local directory or a git
//! repository at a given revision. Builders do not look inside it; they pass
//! it to the job runner, which materialises it as `/workspace`.

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::BuildrefError;
use crate::utils::absolute_path;

/// Where the source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRoot {
    /// A local directory, absolute.
    Directory(PathBuf),
    /// A git repository cloned fresh for the run.
    Git { url: String, revision: Option<String> },
}

/// The source every build in a run reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    pub root: SourceRoot,
    /// Credentials the build needs to fetch the source, by name. Empty for
    /// local directories.
    pub identities: Vec<String>,
}

impl SourceContext {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            root: SourceRoot::Directory(path.into()),
            identities: Vec::new(),
        }
    }

    pub fn git(url: impl Into<String>, revision: Option<String>) -> Self {
        Self {
            root: SourceRoot::Git {
                url: url.into(),
                revision,
            },
            identities: Vec::new(),
        }
    }

    /// Adds an identity reference.
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identities.push(identity.into());
        self
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            SourceRoot::Directory(path) => write!(f, "{}", path.display()),
            SourceRoot::Git {
                url,
                revision: Some(revision),
            } => write!(f, "{url}@{revision}"),
            SourceRoot::Git {
                url,
                revision: None,
            } => f.write_str(url),
        }
    }
}

/// Creates the source context for a run.
///
/// A git URL selects a git source at `git_rev`; otherwise `directory` is used
/// and must exist.
///
/// # Errors
///
/// [`BuildrefError::InvalidValue`] if the directory does not exist.
pub fn create_source_context(
    directory: &Path,
    git_url: Option<String>,
    git_rev: Option<String>,
) -> Result<SourceContext> {
    if let Some(url) = git_url.filter(|u| !u.trim().is_empty()) {
        tracing::debug!("Using git source {} at {}", url, git_rev.as_deref().unwrap_or("HEAD"));
        return Ok(SourceContext::git(url, git_rev.filter(|r| !r.is_empty())));
    }

    let dir = absolute_path(directory)?;
    if !dir.is_dir() {
        return Err(BuildrefError::InvalidValue {
            field: "directory".to_string(),
            value: directory.display().to_string(),
        }
        .into());
    }
    tracing::debug!("Using local source {}", dir.display());
    Ok(SourceContext::directory(dir))
}
