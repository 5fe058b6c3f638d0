//! buildref - build references in YAML/JSON configuration and pin them to
//! image digests.
//!
//! Configuration files often point at the source of an image rather than at
//! a published image: `image: dockerfile:///services/api`. buildref finds every
//! such reference, builds each distinct one exactly once, and rewrites the
//! documents so every occurrence becomes `registry/name@sha256:...`.
//!
//! # Architecture Overview
//!
//! A resolution run is a pipeline:
//!
//! 1. [`document`] expands the inputs into files and decodes each into a
//!    node tree that keeps mapping order.
//! 2. [`resolver`] scans the trees for `scheme://` strings whose scheme has a
//!    registered builder, deduplicates them and dispatches the builds with
//!    bounded parallelism. The first failure cancels everything else.
//! 3. [`builds`] turns one reference into a [`builds::ContentDigest`], by
//!    running kaniko, the buildpacks lifecycle or ko through a
//!    [`builds::runner::JobRunner`].
//! 4. Once every build has succeeded, [`resolver`] writes the digests back and
//!    [`document`] writes the documents to stdout or an output directory.
//!
//! # Core Modules
//!
//! - [`cli`] - `buildref resolve` and the global flags
//! - [`config`] - Global config file and lazily detected git defaults
//! - [`core`] - Error types and user-facing error formatting
//! - [`document`] - Loading, node arena and output writing
//! - [`resolver`] - References, scanning, dispatch and substitution
//! - [`builds`] - Build strategies, image templates, digests and job runners
//! - [`source`] - Where builds read their source from
//! - [`git`] - Thin wrapper over the system `git` binary
//! - [`utils`] - Path helpers and progress bars
//!
//! # Supported Schemes
//!
//! | Scheme | Built with | Example |
//! |---|---|---|
//! | `dockerfile` | kaniko | `dockerfile:///services/api` |
//! | `buildpack` | lifecycle creator | `buildpack:///services/web` |
//! | `ko` | ko | `ko://github.com/org/repo/cmd/server` |
//!
//! # Example
//!
//! ```bash
//! buildref resolve -R -f deploy/ --image 'gcr.io/my-project/$DIR_NAME' > resolved.yaml
//! ```

pub mod builds;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod document;
pub mod git;
pub mod resolver;
pub mod source;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
