//! Fixture helpers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::EnvLookup;

/// A well-formed digest returned by the fakes.
pub const SAMPLE_DIGEST: &str =
    "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// An environment lookup backed by `pairs` only.
pub fn env_lookup(pairs: &[(&str, &str)]) -> EnvLookup {
    let map: HashMap<String, String> =
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
    Arc::new(move |key| map.get(key).cloned())
}

/// Writes `(relative path, content)` pairs under `root`, creating directories.
pub fn write_files(root: &Path, files: &[(&str, &str)]) -> std::io::Result<()> {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
    }
    Ok(())
}
