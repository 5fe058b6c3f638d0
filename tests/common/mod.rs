//! Shared helpers for the integration tests.

#![allow(dead_code)]

use anyhow::{Context, Result};
use buildref::builds::BuilderRegistry;
use buildref::resolver::{ResolveOptions, Resolver};
use buildref::source::SourceContext;
use buildref::test_utils::FakeBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A scratch project directory with helpers to populate and run it.
pub struct TestProject {
    _temp_dir: TempDir, // Keep alive for RAII cleanup
    project_dir: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let project_dir = temp_dir.path().join("project");
        fs::create_dir_all(&project_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            project_dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.project_dir
    }

    /// Writes `content` to `rel` under the project, creating directories.
    pub fn write(&self, rel: &str, content: &str) -> Result<PathBuf> {
        let path = self.project_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        let path = self.project_dir.join(rel);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.project_dir.join(rel).exists()
    }

    /// Options resolving `inputs` (relative to the project, or `-`), with
    /// the project as base directory.
    pub fn options(&self, inputs: &[&str]) -> ResolveOptions {
        let filenames = inputs
            .iter()
            .map(|input| {
                if *input == "-" {
                    input.to_string()
                } else {
                    self.project_dir.join(input).display().to_string()
                }
            })
            .collect();
        let mut options = ResolveOptions::new(filenames);
        options.output.base_dir = self.project_dir.clone();
        options
    }

    /// A resolver that sends all three default schemes to `builder`.
    pub fn resolver(&self, builder: Arc<FakeBuilder>) -> Resolver {
        let mut registry = BuilderRegistry::new();
        for scheme in ["dockerfile", "buildpack", "ko"] {
            registry.register(scheme, builder.clone());
        }
        Resolver::new(registry, Arc::new(SourceContext::directory(&self.project_dir)))
    }

    /// The `buildref` binary, run inside the project with a clean environment.
    pub fn buildref(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("buildref").expect("buildref binary");
        cmd.current_dir(&self.project_dir)
            .env("BUILDREF_NO_PROGRESS", "1")
            .env("BUILDREF_CONFIG", self.project_dir.join(".no-config.toml"))
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("BUILDREF_IMAGE")
            .env_remove("KANIKO_FLAGS")
            .env_remove("REPO_URL")
            .env_remove("DIR_NAME");
        cmd
    }
}
