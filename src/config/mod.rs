//! Configuration sources for resolution runs.
//!
//! Settings reach a run from four places, highest precedence first:
//!
//! 1. Command-line flags
//! 2. Environment variables bound to those flags
//! 3. The global config file ([`GlobalConfig`])
//! 4. Built-in defaults from [`crate::constants`]
//!
//! `buildref package` also reads a per-project file ([`ProjectConfig`]) that
//! sits between the flags and the global config.
//!
//! Git and kaniko defaults that depend on CI variables or on the working copy
//! are computed on demand by [`GitDefaults`].

pub mod git_defaults;
pub mod global;
pub mod project;

pub use git_defaults::{EnvLookup, GitDefaults, process_env};
pub use global::GlobalConfig;
pub use project::ProjectConfig;
