//! Instrumented fakes for the build seams.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::fixtures::{SAMPLE_DIGEST, env_lookup};
use crate::builds::runner::{JobRunner, JobSpec, LogSink};
use crate::builds::{BuildContext, Builder, ContentDigest, ImageTemplate};
use crate::core::BuildrefError;
use crate::resolver::Reference;

/// A [`Builder`] that records how it is called.
///
/// Tracks total calls, builds in flight and the peak number of concurrent
/// builds. Each build waits for the configured delay (or until cancelled),
/// then returns `<image>@<digest>`, where the image defaults to
/// `registry.local/app` and can be a `$DIR_NAME` template.
pub struct FakeBuilder {
    image: ImageTemplate,
    digest: String,
    delay: Duration,
    fail_on: HashSet<String>,
    reject_authority: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    cancelled: AtomicUsize,
    references: Mutex<Vec<String>>,
}

impl Default for FakeBuilder {
    fn default() -> Self {
        Self {
            image: ImageTemplate::new("registry.local/app"),
            digest: SAMPLE_DIGEST.to_string(),
            delay: Duration::ZERO,
            fail_on: HashSet::new(),
            reject_authority: false,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
            references: Mutex::new(Vec::new()),
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_image(mut self, template: &str) -> Self {
        self.image = ImageTemplate::new(template);
        self
    }

    #[must_use]
    pub fn with_digest(mut self, digest: &str) -> Self {
        self.digest = digest.to_string();
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fails immediately when asked to build `reference`.
    #[must_use]
    pub fn fail_on(mut self, reference: &str) -> Self {
        self.fail_on.insert(reference.to_string());
        self
    }

    /// Rejects references with an authority during validation.
    #[must_use]
    pub const fn reject_authority(mut self) -> Self {
        self.reject_authority = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Builds that observed cancellation.
    pub fn cancellations(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// References built, in start order.
    pub fn references(&self) -> Vec<String> {
        self.references.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Builder for FakeBuilder {
    fn validate(&self, reference: &Reference) -> Result<()> {
        if self.reject_authority {
            reference.require_no_authority()?;
        }
        Ok(())
    }

    async fn build(&self, ctx: &BuildContext, reference: &Reference) -> Result<ContentDigest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut references) = self.references.lock() {
            references.push(reference.to_string());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if self.fail_on.contains(reference.as_str()) {
            return Err(BuildrefError::BuildFailed {
                reference: reference.to_string(),
                reason: "fake failure".to_string(),
            }
            .into());
        }

        tokio::select! {
            () = tokio::time::sleep(self.delay) => {}
            () = ctx.cancel.cancelled() => {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                return Err(BuildrefError::Cancelled.into());
            }
        }

        let image = self.image.expand(reference.dir_name(), &env_lookup(&[]))?;
        ContentDigest::new(image, &self.digest)
    }
}

/// A [`JobRunner`] that records jobs and returns `<job image>@SAMPLE_DIGEST`.
#[derive(Default)]
pub struct RecordingRunner {
    jobs: Mutex<Vec<JobSpec>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<JobSpec> {
        self.jobs.lock().map(|j| j.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl JobRunner for RecordingRunner {
    async fn run(
        &self,
        job: &JobSpec,
        logs: &LogSink,
        cancel: &CancellationToken,
    ) -> Result<ContentDigest> {
        if cancel.is_cancelled() {
            return Err(BuildrefError::Cancelled.into());
        }
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push(job.clone());
        }
        logs.line(&format!("{} {}", job.step.command, job.step.args.join(" ")));
        ContentDigest::new(job.image.clone(), SAMPLE_DIGEST)
    }
}
