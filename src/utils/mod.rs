//! Cross-platform utilities and helpers
//!
//! # Modules
//!
//! - [`fs`] - Directory creation and lexical path arithmetic for the output writer
//! - [`progress`] - Progress bar for the build dispatch phase
//!
//! # Example
//!
//! ```rust,no_run
//! use buildref::utils::{ensure_dir, ProgressBar};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! ensure_dir(Path::new("out"))?;
//! let progress = ProgressBar::new(3);
//! progress.set_message("Building 0/3 references");
//! # Ok(())
//! # }
//! ```

pub mod fs;
pub mod progress;

pub use fs::{absolute_path, ensure_dir, ensure_parent_dir, flatten_path, normalize_path, relative_path};
pub use progress::ProgressBar;
