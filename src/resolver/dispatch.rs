//! Build planning, bounded dispatch and result substitution.

use anyhow::Result;
use dashmap::DashMap;
use futures::{StreamExt, TryStreamExt, future, stream};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::Reference;
use super::scanner::OccurrenceSet;
use crate::builds::{BuildContext, Builder, BuilderRegistry, ContentDigest};
use crate::core::BuildrefError;
use crate::document::SourceFile;
use crate::source::SourceContext;
use crate::utils::ProgressBar;

/// Maximum number of builds in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parallelism(NonZeroUsize);

impl Parallelism {
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl TryFrom<i64> for Parallelism {
    type Error = BuildrefError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Self)
            .ok_or_else(|| BuildrefError::InvalidValue {
                field: "parallelism".to_string(),
                value: value.to_string(),
            })
    }
}

/// Resolved artifacts keyed by reference string.
pub type ResultMap = DashMap<String, ContentDigest>;

/// A reference paired with the builder for its scheme.
pub struct PlannedBuild {
    pub reference: Reference,
    pub builder: Arc<dyn Builder>,
}

impl fmt::Debug for PlannedBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedBuild").field("reference", &self.reference.as_str()).finish_non_exhaustive()
    }
}

/// Parses and validates every reference, in sorted order.
///
/// References whose scheme has no builder are skipped. Validation runs for
/// all references before anything is built, so a malformed reference fails
/// the run without starting a single build.
pub fn plan(occurrences: &OccurrenceSet, registry: &BuilderRegistry) -> Result<Vec<PlannedBuild>> {
    let mut planned = Vec::with_capacity(occurrences.len());
    for raw in occurrences.references() {
        let reference = Reference::parse(raw)?;
        let Some(builder) = registry.get(reference.scheme()) else {
            tracing::debug!("Skipping {}: no builder for scheme {:?}", raw, reference.scheme());
            continue;
        };
        builder.validate(&reference)?;
        planned.push(PlannedBuild {
            reference,
            builder: builder.clone(),
        });
    }
    Ok(planned)
}

/// Runs all planned builds with at most `parallelism` in flight.
///
/// The first failure cancels every other build and is returned; results of
/// builds that already finished are dropped with it. Cancelling `cancel`
/// stops the whole dispatch with [`BuildrefError::Cancelled`].
pub async fn dispatch(
    planned: Vec<PlannedBuild>,
    source: Arc<SourceContext>,
    parallelism: Parallelism,
    cancel: &CancellationToken,
    progress: &ProgressBar,
) -> Result<ResultMap> {
    let results = ResultMap::new();
    let total = planned.len();
    if total == 0 {
        return Ok(results);
    }

    let scope = cancel.child_token();
    // Cancels the scope on every exit path, including the caller dropping us.
    let _guard = scope.clone().drop_guard();

    progress.set_message(format!("Building 0/{total} references"));

    let builds = stream::iter(planned)
        .map(|planned| {
            let ctx = BuildContext::new(source.clone(), scope.clone());
            let scope = scope.clone();
            async move {
                tracing::debug!("Dispatching {}", planned.reference);
                match planned.builder.build(&ctx, &planned.reference).await {
                    Ok(digest) => Ok((planned.reference.as_str().to_string(), digest)),
                    Err(e) => {
                        scope.cancel();
                        Err(e)
                    }
                }
            }
        })
        .buffer_unordered(parallelism.get())
        .try_for_each(|(reference, digest)| {
            tracing::debug!("Resolved {} to {}", reference, digest);
            results.insert(reference, digest);
            let done = progress.position() + 1;
            progress.inc(1);
            progress.set_message(format!("Building {done}/{total} references"));
            future::ready(Ok(()))
        });

    tokio::select! {
        biased;
        outcome = builds => outcome?,
        () = cancel.cancelled() => return Err(BuildrefError::Cancelled.into()),
    }

    Ok(results)
}

/// Writes each resolved digest into every node that held its reference.
///
/// Returns the number of nodes rewritten.
///
/// # Errors
///
/// [`BuildrefError::MissingResult`] if a reference has no result, and
/// [`BuildrefError::SubstitutionFailed`] if a value cannot be placed or two
/// keys of one mapping end up equal.
pub fn substitute(
    files: &mut [SourceFile],
    occurrences: &OccurrenceSet,
    planned: &[String],
    results: &ResultMap,
) -> Result<usize> {
    let mut rewritten = 0;
    for reference in planned {
        let digest = results.get(reference).ok_or_else(|| BuildrefError::MissingResult {
            reference: reference.clone(),
        })?;
        let value = digest.to_string();
        for handle in occurrences.handles(reference) {
            let file = &mut files[handle.file];
            file.documents[handle.document].set_string(handle.node, value.clone()).map_err(|reason| {
                BuildrefError::SubstitutionFailed {
                    file: file.designator.to_string(),
                    value: value.clone(),
                    reason,
                }
            })?;
            rewritten += 1;
        }
    }

    for file in files.iter() {
        for document in &file.documents {
            if let Some(key) = document.rewritten_key_collision() {
                return Err(BuildrefError::SubstitutionFailed {
                    file: file.designator.to_string(),
                    value: key.to_string(),
                    reason: "two keys of one mapping resolve to the same value".to_string(),
                }
                .into());
            }
        }
    }
    Ok(rewritten)
}
