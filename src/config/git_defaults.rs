//! Lazily detected git and kaniko defaults.
//!
//! CI systems export the repository and revision being built (`REPO_URL`,
//! `PULL_PULL_SHA`, `PULL_BASE_SHA`) and extra kaniko flags (`KANIKO_FLAGS`).
//! Outside CI the repository is detected from the working directory instead.
//! [`GitDefaults`] computes each value the first time it is asked for and keeps
//! it for the rest of the run.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

use crate::git::{self, DetectedRepository};

/// Environment lookup used by [`GitDefaults`].
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads from the process environment, treating empty values as unset.
pub fn process_env() -> EnvLookup {
    Arc::new(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
}

/// Memoised git URL, git revision and kaniko flags for one run.
///
/// ```rust,no_run
/// use buildref::config::GitDefaults;
///
/// # async fn example() {
/// let defaults = GitDefaults::new(".");
/// if let Some(url) = defaults.git_url().await {
///     println!("building from {url}");
/// }
/// # }
/// ```
pub struct GitDefaults {
    dir: PathBuf,
    env: EnvLookup,
    repository: OnceCell<DetectedRepository>,
    kaniko_flags: OnceLock<Vec<String>>,
}

impl GitDefaults {
    /// Defaults for the repository at `dir`, read from the process environment.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_env(dir, process_env())
    }

    /// Defaults with an explicit environment lookup.
    pub fn with_env(dir: impl Into<PathBuf>, env: EnvLookup) -> Self {
        Self {
            dir: dir.into(),
            env,
            repository: OnceCell::new(),
            kaniko_flags: OnceLock::new(),
        }
    }

    async fn repository(&self) -> &DetectedRepository {
        self.repository
            .get_or_init(|| async {
                let url = (self.env)("REPO_URL");
                let revision =
                    (self.env)("PULL_PULL_SHA").or_else(|| (self.env)("PULL_BASE_SHA"));
                if url.is_some() {
                    return DetectedRepository {
                        url,
                        revision,
                    };
                }

                match git::detect_repository(&self.dir).await {
                    Ok(detected) => {
                        tracing::info!(
                            "Detected git URL {} and ref {}",
                            detected.url.as_deref().unwrap_or(""),
                            detected.revision.as_deref().or(revision.as_deref()).unwrap_or("")
                        );
                        DetectedRepository {
                            url: detected.url,
                            revision: detected.revision.or(revision),
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to detect the git URL: {e:#}");
                        DetectedRepository {
                            url: None,
                            revision,
                        }
                    }
                }
            })
            .await
    }

    /// Repository URL, from `REPO_URL` or the working copy's remote.
    pub async fn git_url(&self) -> Option<String> {
        self.repository().await.url.clone()
    }

    /// Revision, from the working copy's HEAD or the CI pull request variables.
    pub async fn git_rev(&self) -> Option<String> {
        self.repository().await.revision.clone()
    }

    /// Extra kaniko flags from `KANIKO_FLAGS`, split on spaces.
    pub fn kaniko_flags(&self) -> &[String] {
        self.kaniko_flags.get_or_init(|| {
            (self.env)("KANIKO_FLAGS")
                .map(|flags| flags.split(' ').filter(|f| !f.is_empty()).map(String::from).collect())
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn env_of(pairs: &[(&str, &str)]) -> EnvLookup {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Arc::new(move |key| map.get(key).cloned())
    }

    #[tokio::test]
    async fn test_ci_variables_take_precedence() {
        let defaults = GitDefaults::with_env(
            "/nonexistent",
            env_of(&[
                ("REPO_URL", "https://github.com/org/repo.git"),
                ("PULL_BASE_SHA", "base"),
                ("PULL_PULL_SHA", "pull"),
            ]),
        );
        assert_eq!(defaults.git_url().await.as_deref(), Some("https://github.com/org/repo.git"));
        assert_eq!(defaults.git_rev().await.as_deref(), Some("pull"));
    }

    #[tokio::test]
    async fn test_base_sha_fallback() {
        let defaults = GitDefaults::with_env(
            "/nonexistent",
            env_of(&[("REPO_URL", "https://github.com/org/repo.git"), ("PULL_BASE_SHA", "base")]),
        );
        assert_eq!(defaults.git_rev().await.as_deref(), Some("base"));
    }

    #[tokio::test]
    async fn test_detection_failure_is_not_fatal() {
        let temp = tempfile::tempdir().unwrap();
        let defaults = GitDefaults::with_env(temp.path(), env_of(&[("PULL_BASE_SHA", "base")]));
        assert_eq!(defaults.git_url().await, None);
        assert_eq!(defaults.git_rev().await.as_deref(), Some("base"));
    }

    #[tokio::test]
    async fn test_values_are_memoised() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let env: EnvLookup = Arc::new(move |key| {
            counter.fetch_add(1, Ordering::SeqCst);
            (key == "REPO_URL").then(|| "https://example.com/r.git".to_string())
        });
        let defaults = GitDefaults::with_env("/nonexistent", env);

        defaults.git_url().await;
        let after_first = calls.load(Ordering::SeqCst);
        defaults.git_url().await;
        defaults.git_rev().await;
        assert_eq!(calls.load(Ordering::SeqCst), after_first);
    }

    #[test]
    fn test_kaniko_flags_split() {
        let defaults = GitDefaults::with_env(
            "/nonexistent",
            env_of(&[("KANIKO_FLAGS", "--skip-tls-verify  --insecure")]),
        );
        assert_eq!(defaults.kaniko_flags(), ["--skip-tls-verify", "--insecure"]);

        let empty = GitDefaults::with_env("/nonexistent", env_of(&[]));
        assert!(empty.kaniko_flags().is_empty());
    }
}
