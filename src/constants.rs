//! Global constants used throughout the buildref codebase.
//!
//! Default images, binaries, limits and well-known paths live here so the CLI,
//! the build strategies and the tests agree on them.

use std::time::Duration;

/// Default number of builds dispatched at once.
pub const DEFAULT_PARALLELISM: i64 = 20;

/// Root under which build steps see the source context.
///
/// Step arguments are written against this root; the process runner rewrites
/// the prefix to the materialised workspace directory.
pub const WORKSPACE_DIR: &str = "/workspace";

/// Kaniko executor image used for `dockerfile://` builds.
pub const KANIKO_IMAGE: &str = "gcr.io/kaniko-project/executor:multi-arch";

/// Default location of the kaniko executor binary.
pub const DEFAULT_KANIKO_BINARY: &str = "/kaniko/executor";

/// Default buildpack builder image for `buildpack://` builds.
pub const BUILDPACK_IMAGE: &str = "docker.io/paketobuildpacks/builder:base";

/// Default location of the buildpacks lifecycle `creator` binary.
pub const DEFAULT_LIFECYCLE_BINARY: &str = "/cnb/lifecycle/creator";

/// Default ko binary for `ko://` builds.
pub const DEFAULT_KO_BINARY: &str = "ko";

/// Default Dockerfile name, relative to the reference path.
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Default project.toml override file for buildpack builds.
pub const DEFAULT_OVERRIDES_FILE: &str = "overrides.toml";

/// Designator for standard input.
pub const STDIN_DESIGNATOR: &str = "-";

/// Project file read by `buildref package` from the source directory.
pub const PROJECT_FILE: &str = ".buildref.yaml";

/// File extensions picked up when expanding directories.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["yaml", "json"];

/// Character joining path components in flattened output names.
pub const FLATTEN_SEPARATOR: &str = "-";

/// Timeout for git defaults detection commands.
pub const GIT_DETECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for git clone operations of the source context.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(300);

/// Environment variable that disables progress bars.
pub const NO_PROGRESS_ENV: &str = "BUILDREF_NO_PROGRESS";

/// Environment variable pointing at an alternative global config file.
pub const CONFIG_ENV: &str = "BUILDREF_CONFIG";
