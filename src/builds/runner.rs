//! Job execution.
//!
//! Builders describe their work as a [`JobSpec`]: one step (a binary plus
//! arguments written against the `/workspace` and `/buildref/results`
//! roots) and the file the step writes its digest to. A [`JobRunner`] runs the
//! job and returns the resulting [`ContentDigest`].
//!
//! [`ProcessRunner`] runs jobs as local subprocesses. It materialises the
//! source context (the local directory, or a git checkout in a temporary
//! directory), maps both roots onto real directories, streams the step's output
//! line by line into a [`LogSink`] and kills the step when the run is
//! cancelled.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use super::ContentDigest;
use crate::constants::WORKSPACE_DIR;
use crate::core::BuildrefError;
use crate::git;
use crate::source::{SourceContext, SourceRoot};

/// Root under which steps write their results.
pub const RESULTS_DIR: &str = "/buildref/results";

/// How the digest file written by a step is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestFormat {
    /// `sha256:<hex>`, combined with the job's image name.
    Plain,
    /// A full `name@sha256:<hex>` reference.
    Reference,
    /// A buildpacks lifecycle `report.toml` with an `[image].digest` key.
    LifecycleReport,
}

/// The command a job runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStep {
    pub name: String,
    /// Container image providing `command` when run on a cluster.
    pub image: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// A single build job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Name used in logs and errors, usually the reference.
    pub name: String,
    /// Image the job publishes.
    pub image: String,
    pub source: Arc<SourceContext>,
    pub step: JobStep,
    /// Digest file path under [`RESULTS_DIR`].
    pub digest_file: String,
    pub digest_format: DigestFormat,
}

/// Destination for job output.
#[derive(Debug, Clone)]
pub enum LogSink {
    /// Follow mode: lines are written to stderr as they arrive.
    Stderr,
    /// Lines are kept so they can be shown if the job fails.
    Buffer(Arc<Mutex<Vec<String>>>),
}

impl LogSink {
    pub fn buffered() -> Self {
        Self::Buffer(Arc::new(Mutex::new(Vec::new())))
    }

    /// Records one line of output.
    pub fn line(&self, line: &str) {
        match self {
            Self::Stderr => eprintln!("{line}"),
            Self::Buffer(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line.to_string());
                }
            }
        }
    }

    /// Buffered output joined with newlines; empty in follow mode.
    pub fn contents(&self) -> String {
        match self {
            Self::Stderr => String::new(),
            Self::Buffer(lines) => lines.lock().map(|l| l.join("\n")).unwrap_or_default(),
        }
    }
}

/// Runs a job to completion.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Runs `job`, sending its output to `logs`.
    ///
    /// Must stop promptly and return [`BuildrefError::Cancelled`] once
    /// `cancel` fires.
    async fn run(
        &self,
        job: &JobSpec,
        logs: &LogSink,
        cancel: &CancellationToken,
    ) -> Result<ContentDigest>;
}

/// A materialised source directory.
enum Workspace {
    Local(PathBuf),
    Checkout(Arc<TempDir>),
}

impl Workspace {
    fn path(&self) -> &Path {
        match self {
            Self::Local(path) => path,
            Self::Checkout(dir) => dir.path(),
        }
    }
}

/// Runs jobs as local subprocesses.
#[derive(Default)]
pub struct ProcessRunner {
    /// Git checkout shared by all jobs of a run, keyed by URL and revision.
    checkout: OnceCell<(String, Arc<TempDir>)>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    async fn materialize(&self, source: &SourceContext) -> Result<Workspace> {
        match &source.root {
            SourceRoot::Directory(path) => Ok(Workspace::Local(path.clone())),
            SourceRoot::Git {
                url,
                revision,
            } => {
                let key = format!("{url}#{}", revision.as_deref().unwrap_or("HEAD"));
                let (cached_key, dir) = self
                    .checkout
                    .get_or_try_init(|| async {
                        let dir = TempDir::new().context("Failed to create checkout directory")?;
                        git::clone_at_revision(url, revision.as_deref(), dir.path()).await?;
                        Ok::<_, anyhow::Error>((key.clone(), Arc::new(dir)))
                    })
                    .await?;

                if *cached_key == key {
                    return Ok(Workspace::Checkout(dir.clone()));
                }
                let dir = TempDir::new().context("Failed to create checkout directory")?;
                git::clone_at_revision(url, revision.as_deref(), dir.path()).await?;
                Ok(Workspace::Checkout(Arc::new(dir)))
            }
        }
    }
}

/// Replaces a leading `root` in an argument, or in the value of a `--flag=value`
/// argument, with `to`.
pub fn rewrite_root(arg: &str, root: &str, to: &Path) -> String {
    let (flag, value) = match arg.split_once('=') {
        Some((flag, value)) if flag.starts_with('-') => (Some(flag), value),
        _ => (None, arg),
    };
    let Some(rest) = value.strip_prefix(root) else {
        return arg.to_string();
    };
    if !rest.is_empty() && !rest.starts_with('/') {
        return arg.to_string();
    }

    let rewritten = format!("{}{rest}", to.display());
    match flag {
        Some(flag) => format!("{flag}={rewritten}"),
        None => rewritten,
    }
}

async fn pump_lines<R: AsyncRead + Unpin>(reader: Option<R>, logs: &LogSink) -> std::io::Result<()> {
    let Some(reader) = reader else {
        return Ok(());
    };
    // Build tools print progress bars and other non-UTF-8 bytes.
    let mut lines = BufReader::new(reader).split(b'\n');
    while let Some(line) = lines.next_segment().await? {
        let line = line.strip_suffix(b"\r").unwrap_or(&line);
        logs.line(&String::from_utf8_lossy(line));
    }
    Ok(())
}

#[derive(Deserialize)]
struct LifecycleReport {
    image: ReportImage,
}

#[derive(Deserialize)]
struct ReportImage {
    digest: String,
}

/// Reads the digest a step wrote, according to its format.
pub fn read_digest(path: &Path, format: DigestFormat, image: &str) -> Result<ContentDigest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read digest file {}", path.display()))?;
    match format {
        DigestFormat::Plain => ContentDigest::new(image, content.trim()),
        DigestFormat::Reference => ContentDigest::parse(image, &content),
        DigestFormat::LifecycleReport => {
            let report: LifecycleReport = toml::from_str(&content)?;
            ContentDigest::new(image, &report.image.digest)
        }
    }
}

#[async_trait]
impl JobRunner for ProcessRunner {
    async fn run(
        &self,
        job: &JobSpec,
        logs: &LogSink,
        cancel: &CancellationToken,
    ) -> Result<ContentDigest> {
        if cancel.is_cancelled() {
            return Err(BuildrefError::Cancelled.into());
        }

        let workspace = self.materialize(&job.source).await?;
        let results = TempDir::new().context("Failed to create results directory")?;

        let args: Vec<String> = job
            .step
            .args
            .iter()
            .map(|arg| rewrite_root(arg, WORKSPACE_DIR, workspace.path()))
            .map(|arg| rewrite_root(&arg, RESULTS_DIR, results.path()))
            .collect();
        let digest_path = PathBuf::from(rewrite_root(&job.digest_file, RESULTS_DIR, results.path()));

        let binary = which::which(&job.step.command).map_err(|_| {
            BuildrefError::ExecutableNotFound {
                name: job.step.command.clone(),
            }
        })?;

        tracing::debug!("Running: {} {}", binary.display(), args.join(" "));
        let mut child = Command::new(&binary)
            .args(&args)
            .envs(job.step.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(workspace.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to run {}", binary.display()))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let execution = async move {
            let (out, err) = tokio::join!(pump_lines(stdout, logs), pump_lines(stderr, logs));
            out?;
            err?;
            child.wait().await
        };

        let status = tokio::select! {
            status = execution => status?,
            () = cancel.cancelled() => {
                tracing::debug!("Cancelled {}", job.name);
                return Err(BuildrefError::Cancelled.into());
            }
        };

        if !status.success() {
            return Err(BuildrefError::BuildFailed {
                reference: job.name.clone(),
                reason: format!(
                    "{} {} exited with {status}",
                    job.step.command,
                    job.step.args.join(" ")
                ),
            }
            .into());
        }

        read_digest(&digest_path, job.digest_format, &job.image)
    }
}
