//! The `package` subcommand (alias `pkg`).
//!
//! Resolves a project in place: inputs come from `-f` or from the project's
//! `.buildref.yaml`, and resolved files overwrite their sources unless an
//! output directory is configured. A project with nothing to resolve is not an
//! error.

use anyhow::Result;
use clap::Args;

use super::ResolveCommand;
use crate::config::ProjectConfig;
use crate::constants::STDIN_DESIGNATOR;

/// Resolve a project's configuration in place.
#[derive(Args, Debug, Clone)]
pub struct PackageCommand {
    #[command(flatten)]
    resolve: ResolveCommand,
}

impl PackageCommand {
    pub async fn execute(self, config_path: Option<String>) -> Result<()> {
        let project = ProjectConfig::load(&self.resolve.directory).await?;
        let resolve = self.merge(project);

        if resolve.filenames.is_empty() {
            tracing::info!("Nothing to package in {}", resolve.directory.display());
            return Ok(());
        }
        resolve.execute(config_path).await
    }

    /// Fills every option the flags left unset from the project file.
    pub(crate) fn merge(self, project: ProjectConfig) -> ResolveCommand {
        let mut cmd = self.resolve;
        let dir = cmd.directory.clone();

        if cmd.filenames.is_empty() {
            cmd.filenames = project
                .filename
                .iter()
                .map(|name| match name.as_str() {
                    STDIN_DESIGNATOR => name.clone(),
                    _ => dir.join(name).display().to_string(),
                })
                .collect();
        }
        cmd.recursive |= project.recursive;
        cmd.flatten_output |= project.flatten_output;
        cmd.output = cmd
            .output
            .or_else(|| project.output.map(|output| dir.join(output)))
            .or_else(|| Some(dir.clone()));
        cmd.image = cmd.image.or(project.image);
        cmd.dockerfile = cmd.dockerfile.or(project.dockerfile);
        cmd.builder = cmd.builder.or(project.builder);
        cmd.overrides = cmd.overrides.or(project.overrides);
        cmd.allow_no_files = true;
        cmd
    }
}
