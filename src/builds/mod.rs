//! Build strategies and the registry that dispatches to them.
//!
//! A [`Builder`] turns one [`Reference`] into a [`ContentDigest`]. Builders
//! are registered in a [`BuilderRegistry`] under the scheme they handle; the
//! resolver only recognises references whose scheme is registered.
//!
//! # Default strategies
//!
//! | Scheme | Builder | Authority |
//! |---|---|---|
//! | `dockerfile` | [`DockerfileBuilder`] (kaniko) | rejected |
//! | `buildpack` | [`BuildpackBuilder`] (lifecycle creator) | rejected |
//! | `ko` | [`KoBuilder`] | part of the import path |
//!
//! All default builders describe their work as a [`runner::JobSpec`] and hand
//! it to a shared [`runner::JobRunner`].

pub mod buildpacks;
pub mod digest;
pub mod dockerfile;
pub mod image;
pub mod ko;
pub mod runner;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{EnvLookup, process_env};
use crate::constants::{
    BUILDPACK_IMAGE, DEFAULT_DOCKERFILE, DEFAULT_KANIKO_BINARY, DEFAULT_KO_BINARY,
    DEFAULT_LIFECYCLE_BINARY, DEFAULT_OVERRIDES_FILE,
};
use crate::core::BuildrefError;
use crate::resolver::Reference;
use crate::source::SourceContext;

pub use buildpacks::BuildpackBuilder;
pub use digest::ContentDigest;
pub use dockerfile::DockerfileBuilder;
pub use image::ImageTemplate;
pub use ko::KoBuilder;
use runner::{JobRunner, JobSpec, LogSink};

/// Per-build context: the run's source and its cancellation scope.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub source: Arc<SourceContext>,
    pub cancel: CancellationToken,
}

impl BuildContext {
    pub fn new(source: Arc<SourceContext>, cancel: CancellationToken) -> Self {
        Self {
            source,
            cancel,
        }
    }
}

/// A build strategy for one reference scheme.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Checks the reference's shape before any build starts.
    fn validate(&self, _reference: &Reference) -> Result<()> {
        Ok(())
    }

    /// Builds the artifact for `reference`.
    ///
    /// Implementations must return [`BuildrefError::Cancelled`] promptly once
    /// `ctx.cancel` fires.
    async fn build(&self, ctx: &BuildContext, reference: &Reference) -> Result<ContentDigest>;
}

/// Scheme name to builder.
///
/// Populated once at startup and read-only while builds run.
#[derive(Default, Clone)]
pub struct BuilderRegistry {
    builders: HashMap<String, Arc<dyn Builder>>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `dockerfile`, `buildpack` and `ko` strategies.
    pub fn with_defaults(settings: BuildSettings, runner: Arc<dyn JobRunner>) -> Self {
        let settings = Arc::new(settings);
        let mut registry = Self::new();
        registry.register(
            dockerfile::SCHEME,
            Arc::new(DockerfileBuilder::new(settings.clone(), runner.clone())),
        );
        registry.register(
            buildpacks::SCHEME,
            Arc::new(BuildpackBuilder::new(settings.clone(), runner.clone())),
        );
        registry.register(ko::SCHEME, Arc::new(KoBuilder::new(settings, runner)));
        registry
    }

    /// Registers `builder` for `scheme`, replacing any previous one.
    pub fn register(&mut self, scheme: impl Into<String>, builder: Arc<dyn Builder>) {
        self.builders.insert(scheme.into(), builder);
    }

    pub fn get(&self, scheme: &str) -> Option<&Arc<dyn Builder>> {
        self.builders.get(scheme)
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// `scheme://` prefixes the scanner looks for.
    pub fn prefixes(&self) -> Vec<String> {
        self.schemes().into_iter().map(|s| format!("{s}://")).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

/// Settings shared by the default strategies.
#[derive(Clone)]
pub struct BuildSettings {
    /// Image name template for produced artifacts.
    pub image: Option<ImageTemplate>,
    pub dockerfile: String,
    /// Buildpack builder image.
    pub builder: String,
    pub overrides: String,
    pub kaniko_binary: String,
    pub kaniko_args: Vec<String>,
    pub lifecycle_binary: String,
    pub ko_binary: String,
    /// Stream dockerfile build logs to stderr instead of buffering them.
    pub stream_logs: bool,
    /// Environment used to expand image templates.
    pub env: EnvLookup,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            image: None,
            dockerfile: DEFAULT_DOCKERFILE.to_string(),
            builder: BUILDPACK_IMAGE.to_string(),
            overrides: DEFAULT_OVERRIDES_FILE.to_string(),
            kaniko_binary: DEFAULT_KANIKO_BINARY.to_string(),
            kaniko_args: Vec::new(),
            lifecycle_binary: DEFAULT_LIFECYCLE_BINARY.to_string(),
            ko_binary: DEFAULT_KO_BINARY.to_string(),
            stream_logs: false,
            env: process_env(),
        }
    }
}

impl BuildSettings {
    /// Expands the image template for `reference`.
    ///
    /// # Errors
    ///
    /// [`BuildrefError::MissingField`] when no image is configured, or
    /// [`BuildrefError::InvalidImageName`] when the expansion is invalid.
    pub fn image_for(&self, reference: &Reference) -> Result<String> {
        let template = self.image.as_ref().ok_or_else(|| BuildrefError::MissingField {
            field: "image".to_string(),
        })?;
        template.expand(reference.dir_name(), &self.env)
    }
}

/// Runs a job, dumping buffered output through `tracing` if it fails.
pub(crate) async fn run_job(
    runner: &dyn JobRunner,
    job: &JobSpec,
    stream_logs: bool,
    cancel: &CancellationToken,
) -> Result<ContentDigest> {
    let logs = if stream_logs { LogSink::Stderr } else { LogSink::buffered() };
    let result = runner.run(job, &logs, cancel).await;

    if let Err(e) = &result {
        let cancelled = matches!(e.downcast_ref::<BuildrefError>(), Some(BuildrefError::Cancelled));
        let output = logs.contents();
        if !cancelled && !output.is_empty() {
            tracing::error!("Build of {} failed, output:\n{}", job.name, output);
        }
    }
    result
}
