//! `dockerfile://` builds with the kaniko executor.
//!
//! `dockerfile:///services/api` builds `services/api/Dockerfile` with
//! `services/api` as the build context and publishes it under the configured
//! image name. References must not carry an authority component.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::runner::{DigestFormat, JobRunner, JobSpec, JobStep, RESULTS_DIR};
use super::{BuildContext, BuildSettings, Builder, ContentDigest, run_job};
use crate::constants::{KANIKO_IMAGE, WORKSPACE_DIR};
use crate::resolver::Reference;
use crate::utils::normalize_path;

pub const SCHEME: &str = "dockerfile";

const DIGEST_FILE: &str = "IMAGE-DIGEST";

/// Builds Dockerfiles with kaniko.
pub struct DockerfileBuilder {
    settings: Arc<BuildSettings>,
    runner: Arc<dyn JobRunner>,
}

impl DockerfileBuilder {
    pub fn new(settings: Arc<BuildSettings>, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            settings,
            runner,
        }
    }

    /// The kaniko job for `reference`, publishing `image`.
    pub fn job(&self, ctx: &BuildContext, reference: &Reference, image: &str) -> JobSpec {
        let context = normalize_path(&Path::new(WORKSPACE_DIR).join(reference.relative_path()));
        let dockerfile = normalize_path(&context.join(&self.settings.dockerfile));
        let digest_file = format!("{RESULTS_DIR}/{DIGEST_FILE}");

        let mut args = vec![
            format!("--dockerfile={}", dockerfile.display()),
            format!("--context={}", context.display()),
            format!("--destination={image}"),
            format!("--digest-file={digest_file}"),
            "--cache=true".to_string(),
            "--cache-ttl=24h".to_string(),
        ];
        args.extend(self.settings.kaniko_args.iter().cloned());

        JobSpec {
            name: reference.to_string(),
            image: image.to_string(),
            source: ctx.source.clone(),
            step: JobStep {
                name: "build-and-push".to_string(),
                image: KANIKO_IMAGE.to_string(),
                command: self.settings.kaniko_binary.clone(),
                args,
                env: vec![("DOCKER_CONFIG".to_string(), "/tekton/home/.docker".to_string())],
            },
            digest_file,
            digest_format: DigestFormat::Plain,
        }
    }
}

#[async_trait]
impl Builder for DockerfileBuilder {
    fn validate(&self, reference: &Reference) -> Result<()> {
        reference.require_no_authority()?;
        self.settings.image_for(reference).map(|_| ())
    }

    async fn build(&self, ctx: &BuildContext, reference: &Reference) -> Result<ContentDigest> {
        reference.require_no_authority()?;
        let image = self.settings.image_for(reference)?;
        tracing::info!("Building image {}", image);

        let job = self.job(ctx, reference, &image);
        run_job(self.runner.as_ref(), &job, self.settings.stream_logs, &ctx.cancel).await
    }
}
