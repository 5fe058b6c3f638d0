//! Reference resolution engine.
//!
//! A resolution run goes through five phases:
//!
//! 1. **Load**: expand the inputs into files and decode their documents
//!    ([`crate::document::loader`]).
//! 2. **Scan**: find every string scalar starting with a registered
//!    `scheme://` prefix and group the nodes by reference string
//!    ([`scanner::OccurrenceSet`]).
//! 3. **Plan**: parse each distinct reference, skip schemes without a builder,
//!    and validate the rest before anything is built ([`dispatch::plan`]).
//! 4. **Dispatch**: build each distinct reference exactly once, at most
//!    `parallelism` at a time, stopping everything on the first failure
//!    ([`dispatch::dispatch`]).
//! 5. **Substitute and write**: once every build has succeeded, replace the
//!    nodes with `image@digest` and write the documents out
//!    ([`dispatch::substitute`], [`crate::document::writer`]).
//!
//! Nothing is written unless every build succeeds.
//!
//! # Example
//!
//! ```rust,no_run
//! use buildref::builds::{BuildSettings, BuilderRegistry, ImageTemplate};
//! use buildref::builds::runner::ProcessRunner;
//! use buildref::resolver::{ResolveOptions, Resolver};
//! use buildref::source::SourceContext;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = BuildSettings {
//!     image: Some(ImageTemplate::new("gcr.io/project/$DIR_NAME:latest")),
//!     ..BuildSettings::default()
//! };
//! let registry = BuilderRegistry::with_defaults(settings, Arc::new(ProcessRunner::new()));
//! let resolver = Resolver::new(registry, Arc::new(SourceContext::directory(".")));
//!
//! let options = ResolveOptions::new(vec!["config/".to_string()]);
//! let summary = resolver.run(&options, &mut std::io::stdout(), &CancellationToken::new()).await?;
//! eprintln!("built {} reference(s)", summary.builds);
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod reference;
pub mod scanner;

use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::builds::BuilderRegistry;
use crate::constants::DEFAULT_PARALLELISM;
use crate::core::BuildrefError;
use crate::document::{OutputOptions, SourceFile, enumerate_files, load_files, write_documents};
use crate::source::SourceContext;
use crate::utils::ProgressBar;

pub use dispatch::{Parallelism, PlannedBuild, ResultMap};
pub use reference::Reference;
pub use scanner::{OccurrenceSet, ReferenceScanner};

/// Inputs and output settings of a resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Files, directories, or `-` for stdin.
    pub filenames: Vec<String>,
    pub recursive: bool,
    /// Accept an empty `filenames` list.
    pub allow_no_files: bool,
    pub parallelism: i64,
    pub output: OutputOptions,
}

impl ResolveOptions {
    pub fn new(filenames: Vec<String>) -> Self {
        Self {
            filenames,
            recursive: false,
            allow_no_files: false,
            parallelism: DEFAULT_PARALLELISM,
            output: OutputOptions {
                output_dir: None,
                flatten: false,
                base_dir: PathBuf::from("."),
            },
        }
    }

    /// Checks the options before any I/O happens.
    pub fn validate(&self) -> Result<Parallelism> {
        if self.filenames.is_empty() && !self.allow_no_files {
            return Err(BuildrefError::MissingField {
                field: "filename".to_string(),
            }
            .into());
        }
        Ok(Parallelism::try_from(self.parallelism)?)
    }
}

/// What a run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub files: usize,
    pub documents: usize,
    /// Distinct references built.
    pub builds: usize,
    /// Nodes rewritten.
    pub substitutions: usize,
}

/// Resolves build references with a fixed registry and source context.
pub struct Resolver {
    registry: BuilderRegistry,
    source: Arc<SourceContext>,
}

impl Resolver {
    pub fn new(registry: BuilderRegistry, source: Arc<SourceContext>) -> Self {
        Self {
            registry,
            source,
        }
    }

    /// Scans, builds and substitutes references in already loaded files.
    ///
    /// Nothing is substituted unless every build succeeded. A failed
    /// substitution may leave some values rewritten; such files must not be
    /// written.
    pub async fn resolve(
        &self,
        files: &mut [SourceFile],
        parallelism: Parallelism,
        cancel: &CancellationToken,
    ) -> Result<ResolveSummary> {
        let prefixes = self.registry.prefixes();
        let occurrences = OccurrenceSet::collect(files, &prefixes);
        tracing::debug!(
            "Found {} distinct reference(s) in {} node(s)",
            occurrences.len(),
            occurrences.occurrence_count()
        );

        let planned = dispatch::plan(&occurrences, &self.registry)?;
        let keys: Vec<String> = planned.iter().map(|p| p.reference.as_str().to_string()).collect();

        let progress = if planned.is_empty() {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(planned.len() as u64)
        };
        let results =
            dispatch::dispatch(planned, self.source.clone(), parallelism, cancel, &progress).await;
        progress.finish_and_clear();
        let results = results?;

        let substitutions = dispatch::substitute(files, &occurrences, &keys, &results)?;
        Ok(ResolveSummary {
            files: files.len(),
            documents: files.iter().map(|f| f.documents.len()).sum(),
            builds: keys.len(),
            substitutions,
        })
    }

    /// Runs the whole pipeline: enumerate, load, resolve, write.
    ///
    /// Documents go to `stream` unless an output directory is configured.
    pub async fn run(
        &self,
        options: &ResolveOptions,
        stream: &mut dyn Write,
        cancel: &CancellationToken,
    ) -> Result<ResolveSummary> {
        let parallelism = options.validate()?;

        let designators = enumerate_files(&options.filenames, options.recursive)?;
        let mut files = load_files(designators)?;

        let summary = self.resolve(&mut files, parallelism, cancel).await?;
        write_documents(&files, &options.output, stream)?;

        tracing::debug!(
            "Resolved {} reference(s) across {} file(s)",
            summary.builds,
            summary.files
        );
        Ok(summary)
    }
}
