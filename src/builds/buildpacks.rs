//! `buildpack://` builds with the Cloud Native Buildpacks lifecycle.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::runner::{DigestFormat, JobRunner, JobSpec, JobStep, RESULTS_DIR};
use super::{BuildContext, BuildSettings, Builder, ContentDigest, run_job};
use crate::constants::WORKSPACE_DIR;
use crate::resolver::Reference;
use crate::utils::normalize_path;

pub const SCHEME: &str = "buildpack";

const REPORT_FILE: &str = "report.toml";

/// Builds application directories with the lifecycle `creator`.
///
/// The application path comes from the reference (`buildpack:///app`);
/// project metadata overrides are read from the configured overrides file
/// inside that directory.
pub struct BuildpackBuilder {
    settings: Arc<BuildSettings>,
    runner: Arc<dyn JobRunner>,
}

impl BuildpackBuilder {
    pub fn new(settings: Arc<BuildSettings>, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            settings,
            runner,
        }
    }

    pub fn job(&self, ctx: &BuildContext, reference: &Reference, image: &str) -> JobSpec {
        let app = normalize_path(&Path::new(WORKSPACE_DIR).join(reference.relative_path()));
        let overrides = normalize_path(&app.join(&self.settings.overrides));
        let report = format!("{RESULTS_DIR}/{REPORT_FILE}");

        JobSpec {
            name: reference.to_string(),
            image: image.to_string(),
            source: ctx.source.clone(),
            step: JobStep {
                name: "create".to_string(),
                image: self.settings.builder.clone(),
                command: self.settings.lifecycle_binary.clone(),
                args: vec![
                    format!("-app={}", app.display()),
                    format!("-project-metadata={}", overrides.display()),
                    format!("-report={report}"),
                    image.to_string(),
                ],
                env: vec![("CNB_PLATFORM_API".to_string(), "0.4".to_string())],
            },
            digest_file: report,
            digest_format: DigestFormat::LifecycleReport,
        }
    }
}

#[async_trait]
impl Builder for BuildpackBuilder {
    fn validate(&self, reference: &Reference) -> Result<()> {
        reference.require_no_authority()?;
        self.settings.image_for(reference).map(|_| ())
    }

    async fn build(&self, ctx: &BuildContext, reference: &Reference) -> Result<ContentDigest> {
        reference.require_no_authority()?;
        let image = self.settings.image_for(reference)?;
        tracing::info!("Building image {} with {}", image, self.settings.builder);

        let job = self.job(ctx, reference, &image);
        run_job(self.runner.as_ref(), &job, false, &ctx.cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builds::ImageTemplate;
    use crate::core::BuildrefError;
    use crate::source::SourceContext;
    use crate::test_utils::RecordingRunner;
    use tokio_util::sync::CancellationToken;

    fn builder() -> BuildpackBuilder {
        let settings = BuildSettings {
            image: Some(ImageTemplate::new("registry.local/$DIR_NAME")),
            ..BuildSettings::default()
        };
        BuildpackBuilder::new(Arc::new(settings), Arc::new(RecordingRunner::new()))
    }

    #[test]
    fn test_lifecycle_arguments() {
        let ctx = BuildContext::new(Arc::new(SourceContext::directory("/src")), CancellationToken::new());
        let reference = Reference::parse("buildpack:///apps/web").unwrap();
        let job = builder().job(&ctx, &reference, "registry.local/web");

        assert_eq!(
            job.step.args,
            vec![
                "-app=/workspace/apps/web",
                "-project-metadata=/workspace/apps/web/overrides.toml",
                "-report=/buildref/results/report.toml",
                "registry.local/web",
            ]
        );
        assert_eq!(job.step.command, "/cnb/lifecycle/creator");
        assert_eq!(job.step.image, "docker.io/paketobuildpacks/builder:base");
        assert_eq!(job.digest_format, DigestFormat::LifecycleReport);
    }

    #[test]
    fn test_validate() {
        let b = builder();
        b.validate(&Reference::parse("buildpack:///apps/web").unwrap()).unwrap();

        let err = b.validate(&Reference::parse("buildpack://apps/web").unwrap()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("buildpack:///"), "{msg}");
        assert!(matches!(
            err.downcast_ref::<BuildrefError>(),
            Some(BuildrefError::UnexpectedHost { .. })
        ));
    }
}
