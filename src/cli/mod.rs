//! Command-line interface for buildref.
//!
//! `resolve` finds build references in YAML/JSON files, builds them and
//! prints (or writes) the documents with every reference replaced by a
//! digest-pinned image. `package` (alias `pkg`) does the same for a whole
//! project, in place, reading its inputs from `.buildref.yaml`.
//!
//! ```bash
//! # Resolve a directory tree, writing the result to stdout
//! buildref resolve -R -f config/ --image 'gcr.io/project/$DIR_NAME'
//!
//! # Mirror the resolved files under out/, four builds at a time
//! buildref resolve -f config/ -O out/ -P 4
//!
//! # Read from stdin
//! cat app.yaml | buildref resolve -f - --image registry.local/app
//!
//! # Resolve the files listed in ./.buildref.yaml, overwriting them
//! buildref pkg
//! ```
//!
//! # Global Options
//!
//! - `--verbose` - Enable debug output
//! - `--quiet` - Only show errors
//! - `--no-progress` - Disable progress bars
//! - `--config` - Path to a custom global config file
//!
//! Logs and progress bars always go to stderr; stdout is reserved for the
//! resolved documents.

mod package;
mod resolve;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::constants::{CONFIG_ENV, NO_PROGRESS_ENV};

pub use package::PackageCommand;
pub use resolve::ResolveCommand;

/// Runtime configuration derived from the global flags.
///
/// Kept separate from [`Cli`] so tests can build one without parsing
/// arguments.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: Option<String>,

    /// Hide progress bars (`BUILDREF_NO_PROGRESS`).
    pub no_progress: bool,

    /// Global config file location, overriding `~/.buildref/config.toml`.
    pub config_path: Option<String>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exports the settings read by other modules through the environment.
    ///
    /// Must be called before any build is dispatched.
    pub fn apply_to_env(&self) {
        if self.no_progress {
            // SAFETY: called once from the main task before builds start.
            unsafe { std::env::set_var(NO_PROGRESS_ENV, "1") };
        }

        if let Some(ref path) = self.config_path {
            // SAFETY: as above.
            unsafe { std::env::set_var(CONFIG_ENV, path) };
        }
    }

    /// Installs the global `tracing` subscriber, writing to stderr.
    ///
    /// `RUST_LOG` wins over the configured level when set. Calling this more
    /// than once is harmless.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(self.log_level.as_deref().unwrap_or("info"))
        });

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Build references inside YAML/JSON and pin them to image digests.
#[derive(Parser)]
#[command(
    name = "buildref",
    about = "Build scheme references in YAML/JSON configuration and pin them to image digests",
    version,
    author,
    long_about = "buildref scans YAML/JSON documents for dockerfile://, buildpack:// and ko:// references, \
                  builds each distinct reference once and replaces it with image@digest."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a custom global config file (default: ~/.buildref/config.toml).
    #[arg(short, long, global = true, env = "BUILDREF_CONFIG")]
    config: Option<String>,

    /// Disable progress bars.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every reference in the given files and print the resolved documents.
    ///
    /// See [`ResolveCommand`] for the options.
    Resolve(ResolveCommand),

    /// Resolve a project in place, with inputs from `.buildref.yaml`.
    #[command(alias = "pkg")]
    Package(PackageCommand),
}

impl Cli {
    /// Runs the parsed command with a configuration built from its flags.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// `--verbose` maps to `debug`, `--quiet` to `error`, otherwise `info`.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level: Some(log_level.to_string()),
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Runs the parsed command with an explicit configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.apply_to_env();
        config.init_logging();

        match self.command {
            Commands::Resolve(cmd) => cmd.execute(config.config_path).await,
            Commands::Package(cmd) => cmd.execute(config.config_path).await,
        }
    }
}
