//! `ko://` builds of Go import paths.
//!
//! Everything after `ko://` is the import path, so `ko://github.com/org/repo/cmd/app`
//! is valid and its host is part of the path. ko publishes the image itself
//! and reports the full `name@digest` reference.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::runner::{DigestFormat, JobRunner, JobSpec, JobStep, RESULTS_DIR};
use super::{BuildContext, BuildSettings, Builder, ContentDigest, run_job};
use crate::resolver::Reference;

pub const SCHEME: &str = "ko";

const IMAGE_REFS_FILE: &str = "IMAGE-REFS";

/// Image name used when none is configured; ko names the image after the import path.
const KO_LOCAL: &str = "ko.local";

pub struct KoBuilder {
    settings: Arc<BuildSettings>,
    runner: Arc<dyn JobRunner>,
}

impl KoBuilder {
    pub fn new(settings: Arc<BuildSettings>, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            settings,
            runner,
        }
    }

    pub fn job(&self, ctx: &BuildContext, reference: &Reference, repository: &str) -> JobSpec {
        let refs_file = format!("{RESULTS_DIR}/{IMAGE_REFS_FILE}");
        JobSpec {
            name: reference.to_string(),
            image: repository.to_string(),
            source: ctx.source.clone(),
            step: JobStep {
                name: "ko-build".to_string(),
                image: String::new(),
                command: self.settings.ko_binary.clone(),
                args: vec![
                    "build".to_string(),
                    reference.opaque().to_string(),
                    format!("--image-refs={refs_file}"),
                ],
                env: vec![("KO_DOCKER_REPO".to_string(), repository.to_string())],
            },
            digest_file: refs_file,
            digest_format: DigestFormat::Reference,
        }
    }

    fn repository(&self, reference: &Reference) -> Result<String> {
        match &self.settings.image {
            Some(_) => self.settings.image_for(reference),
            None => Ok(KO_LOCAL.to_string()),
        }
    }
}

#[async_trait]
impl Builder for KoBuilder {
    fn validate(&self, reference: &Reference) -> Result<()> {
        self.repository(reference).map(|_| ())
    }

    async fn build(&self, ctx: &BuildContext, reference: &Reference) -> Result<ContentDigest> {
        let repository = self.repository(reference)?;
        tracing::info!("Building {} into {}", reference.opaque(), repository);

        let job = self.job(ctx, reference, &repository);
        run_job(self.runner.as_ref(), &job, false, &ctx.cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builds::ImageTemplate;
    use crate::source::SourceContext;
    use crate::test_utils::RecordingRunner;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_ko_job_keeps_host_in_import_path() {
        let builder = KoBuilder::new(Arc::new(BuildSettings::default()), Arc::new(RecordingRunner::new()));
        let ctx = BuildContext::new(Arc::new(SourceContext::directory("/src")), CancellationToken::new());
        let reference = Reference::parse("ko://github.com/org/repo/cmd/app").unwrap();

        builder.validate(&reference).unwrap();
        let job = builder.job(&ctx, &reference, "ko.local");
        assert_eq!(
            job.step.args,
            vec!["build", "github.com/org/repo/cmd/app", "--image-refs=/buildref/results/IMAGE-REFS"]
        );
        assert_eq!(job.step.env, vec![("KO_DOCKER_REPO".to_string(), "ko.local".to_string())]);
        assert_eq!(job.digest_format, DigestFormat::Reference);
    }

    #[test]
    fn test_repository_from_template() {
        let settings = BuildSettings {
            image: Some(ImageTemplate::new("registry.local/$DIR_NAME")),
            ..BuildSettings::default()
        };
        let builder = KoBuilder::new(Arc::new(settings), Arc::new(RecordingRunner::new()));
        let reference = Reference::parse("ko://github.com/org/repo/cmd/app").unwrap();
        assert_eq!(builder.repository(&reference).unwrap(), "registry.local/app");
    }
}
