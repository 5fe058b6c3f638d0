//! Core types for buildref
//!
//! This module holds the error types shared by every phase of a resolution
//! run.
//!
//! - [`BuildrefError`] - Enumerated failure modes (configuration, enumeration,
//!   parsing, reference shape, build, consistency, output)
//! - [`ErrorContext`] - User-friendly wrapper with details and suggestions
//! - [`user_friendly_error`] - Convert any [`anyhow::Error`] for display
//!
//! # Example
//!
//! ```rust
//! use buildref::core::{BuildrefError, user_friendly_error};
//!
//! let err = anyhow::Error::from(BuildrefError::MissingField {
//!     field: "filename".to_string(),
//! });
//! let ctx = user_friendly_error(err);
//! assert!(ctx.suggestion.is_some());
//! ```

pub mod error;

pub use error::{BuildrefError, ErrorContext, user_friendly_error};
