//! Integration test suite for buildref
//!
//! End-to-end tests that drive the library through [`buildref::resolver::Resolver`]
//! with instrumented fake builders, and the `buildref` binary through
//! `assert_cmd`.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: flag validation, stdin, pass-through and `package` through the binary
//! - **output**: mirrored and flattened output directories
//! - **process_runner**: real subprocess builds with a scripted kaniko (unix)
//! - **scenarios**: dedup, pass-through, authority, parallelism, fail-fast

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod output;
#[cfg(unix)]
mod process_runner;
mod scenarios;
