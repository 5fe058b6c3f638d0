//! Test utilities for buildref
//!
//! Fake builders and job runners, fixture writers and logging setup shared by
//! the unit tests and the integration suite (via the `test-utils` feature).
//!
//! # Example
//!
//! ```rust,ignore
//! use buildref::test_utils::{FakeBuilder, init_test_logging};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! init_test_logging(None);
//! let builder = Arc::new(FakeBuilder::new().with_delay(Duration::from_millis(10)));
//! assert_eq!(builder.calls(), 0);
//! ```

pub mod builders;
pub mod fixtures;

pub use builders::{FakeBuilder, RecordingRunner};
pub use fixtures::{SAMPLE_DIGEST, env_lookup, write_files};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays
/// off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}
