//! The `resolve` subcommand.
//!
//! Flags win over the global config file, which wins over built-in defaults.
//! When `--detect-git` is set, a missing git URL or revision is filled from
//! the CI environment or the working copy (see [`GitDefaults`]).

use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::builds::runner::ProcessRunner;
use crate::builds::{BuildSettings, BuilderRegistry, ImageTemplate};
use crate::config::{GitDefaults, GlobalConfig};
use crate::constants::DEFAULT_PARALLELISM;
use crate::core::BuildrefError;
use crate::document::OutputOptions;
use crate::resolver::{Parallelism, ResolveOptions, Resolver};
use crate::source::create_source_context;

/// Build the references in a set of files and emit the resolved documents.
#[derive(Args, Debug, Clone)]
pub struct ResolveCommand {
    /// File or directory to resolve, `-` for stdin. Repeatable.
    #[arg(short = 'f', long = "filename", value_name = "PATH")]
    pub(crate) filenames: Vec<String>,

    /// Recurse into subdirectories.
    #[arg(short = 'R', long)]
    pub(crate) recursive: bool,

    /// Maximum number of builds running at once [default: 20].
    #[arg(short = 'P', long, value_name = "NUM", allow_negative_numbers = true)]
    pub(crate) parallelism: Option<i64>,

    /// Write resolved files under this directory instead of stdout.
    #[arg(short = 'O', long = "output", value_name = "DIR")]
    pub(crate) output: Option<PathBuf>,

    /// Write output files directly into the output directory, joining path
    /// components with `-`.
    #[arg(long)]
    pub(crate) flatten_output: bool,

    /// Succeed when no filename is given.
    #[arg(long)]
    pub(crate) allow_no_files: bool,

    /// Source directory for builds; also the base for output paths.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub(crate) directory: PathBuf,

    /// Image name template, e.g. `gcr.io/project/$DIR_NAME`.
    #[arg(long, env = "BUILDREF_IMAGE")]
    pub(crate) image: Option<String>,

    /// Dockerfile name relative to each `dockerfile://` path [default: Dockerfile].
    #[arg(long)]
    pub(crate) dockerfile: Option<String>,

    /// Buildpack builder image.
    #[arg(long)]
    pub(crate) builder: Option<String>,

    /// Project metadata override file for buildpack builds [default: overrides.toml].
    #[arg(long)]
    pub(crate) overrides: Option<String>,

    #[arg(long, value_name = "PATH")]
    pub(crate) kaniko_binary: Option<String>,

    /// Extra argument passed to kaniko. Repeatable.
    #[arg(long = "kaniko-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub(crate) kaniko_args: Vec<String>,

    #[arg(long, value_name = "PATH")]
    pub(crate) lifecycle_binary: Option<String>,

    #[arg(long, value_name = "PATH")]
    pub(crate) ko_binary: Option<String>,

    /// Build from a fresh clone of this repository instead of `--directory`.
    #[arg(long)]
    pub(crate) git_url: Option<String>,

    /// Revision to check out with `--git-url` (default: HEAD).
    #[arg(long)]
    pub(crate) git_rev: Option<String>,

    /// Fill a missing git URL and revision from the environment or the
    /// working copy.
    #[arg(long)]
    pub(crate) detect_git: bool,
}

impl ResolveCommand {
    /// Runs the command, writing to stdout unless `--output` is set.
    pub async fn execute(self, config_path: Option<String>) -> Result<()> {
        self.validate()?;

        let config = GlobalConfig::load_with_optional(config_path.map(PathBuf::from)).await?;
        let defaults = GitDefaults::new(&self.directory);

        let options = self.options(&config);
        let (git_url, git_rev) = self.git_location(&config, &defaults).await;
        let source = create_source_context(&self.directory, git_url, git_rev)?;
        let settings = self.settings(&config, &defaults);

        let registry = BuilderRegistry::with_defaults(settings, Arc::new(ProcessRunner::new()));
        let resolver = Resolver::new(registry, Arc::new(source));

        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling builds");
                interrupt.cancel();
            }
        });

        let mut stdout = std::io::stdout();
        let summary = resolver.run(&options, &mut stdout, &cancel).await?;
        stdout.flush()?;

        tracing::info!(
            "Built {} reference(s), rewrote {} value(s) in {} file(s)",
            summary.builds,
            summary.substitutions,
            summary.files
        );
        Ok(())
    }

    /// Checks the flags that can be checked without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.filenames.is_empty() && !self.allow_no_files {
            return Err(BuildrefError::MissingField {
                field: "filename".to_string(),
            }
            .into());
        }
        if let Some(parallelism) = self.parallelism {
            Parallelism::try_from(parallelism)?;
        }
        if self.flatten_output && self.output.is_none() {
            tracing::warn!("--flatten-output has no effect without --output");
        }
        Ok(())
    }

    pub(crate) fn options(&self, config: &GlobalConfig) -> ResolveOptions {
        ResolveOptions {
            filenames: self.filenames.clone(),
            recursive: self.recursive,
            allow_no_files: self.allow_no_files,
            parallelism: self.parallelism.or(config.parallelism).unwrap_or(DEFAULT_PARALLELISM),
            output: OutputOptions {
                output_dir: self.output.clone(),
                flatten: self.flatten_output,
                base_dir: self.directory.clone(),
            },
        }
    }

    pub(crate) fn settings(&self, config: &GlobalConfig, defaults: &GitDefaults) -> BuildSettings {
        let base = BuildSettings::default();
        let pick = |flag: &Option<String>, file: &Option<String>, default: String| {
            flag.clone().or_else(|| file.clone()).unwrap_or(default)
        };

        let mut kaniko_args = config.kaniko_args.clone();
        kaniko_args.extend(defaults.kaniko_flags().iter().cloned());
        kaniko_args.extend(self.kaniko_args.iter().cloned());

        BuildSettings {
            image: self.image.clone().or_else(|| config.image.clone()).map(ImageTemplate::new),
            dockerfile: pick(&self.dockerfile, &config.dockerfile, base.dockerfile),
            builder: pick(&self.builder, &config.builder, base.builder),
            overrides: pick(&self.overrides, &config.overrides, base.overrides),
            kaniko_binary: pick(&self.kaniko_binary, &config.kaniko_binary, base.kaniko_binary),
            kaniko_args,
            lifecycle_binary: pick(
                &self.lifecycle_binary,
                &config.lifecycle_binary,
                base.lifecycle_binary,
            ),
            ko_binary: pick(&self.ko_binary, &config.ko_binary, base.ko_binary),
            // stdout carries the documents unless they go to a directory
            stream_logs: self.output.is_some(),
            env: base.env,
        }
    }

    pub(crate) async fn git_location(
        &self,
        config: &GlobalConfig,
        defaults: &GitDefaults,
    ) -> (Option<String>, Option<String>) {
        let mut url = self.git_url.clone().or_else(|| config.git_url.clone());
        let mut rev = self.git_rev.clone().or_else(|| config.git_rev.clone());
        if self.detect_git {
            if url.is_none() {
                url = defaults.git_url().await;
            }
            if rev.is_none() {
                rev = defaults.git_rev().await;
            }
        }
        (url, rev)
    }
}
