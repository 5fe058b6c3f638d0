//! Error handling for buildref
//!
//! This module provides the error types and user-facing error reporting used by
//! every phase of a resolution run. It follows two principles:
//! 1. **Strongly-typed errors** for precise handling in library code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`BuildrefError`] - Enumerated failure modes of a resolution run
//! - [`ErrorContext`] - Wrapper that adds details and a suggestion for display
//!
//! # Error Categories
//!
//! - **Configuration**: [`BuildrefError::ConfigError`], [`BuildrefError::MissingField`],
//!   [`BuildrefError::InvalidValue`]
//! - **Enumeration and parsing**: [`BuildrefError::EnumerationFailed`],
//!   [`BuildrefError::ParseError`]
//! - **References**: [`BuildrefError::InvalidReference`], [`BuildrefError::UnexpectedHost`]
//! - **Builds**: [`BuildrefError::BuildFailed`], [`BuildrefError::Cancelled`],
//!   [`BuildrefError::InvalidDigest`], [`BuildrefError::InvalidImageName`]
//! - **Consistency and output**: [`BuildrefError::MissingResult`],
//!   [`BuildrefError::SubstitutionFailed`], [`BuildrefError::OutputError`]
//!
//! Library functions return [`anyhow::Result`]; domain failures are raised as
//! [`BuildrefError`] and recovered with [`anyhow::Error::downcast_ref`] by
//! [`user_friendly_error`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use buildref::core::{BuildrefError, ErrorContext, user_friendly_error};
//!
//! let err = anyhow::Error::from(BuildrefError::UnexpectedHost {
//!     scheme: "dockerfile".to_string(),
//!     host: "app".to_string(),
//! });
//! let ctx = user_friendly_error(err);
//! ctx.display(); // Shows colored error with a suggestion
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for buildref operations.
///
/// Each variant corresponds to one failure class of a resolution run. Messages
/// are written for end users; structured fields carry the offending path,
/// reference or value so callers can match on them.
#[derive(Error, Debug)]
pub enum BuildrefError {
    /// A configuration value is unusable.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// A required option was not supplied.
    #[error("missing field(s): {field}")]
    MissingField {
        /// Name of the missing option
        field: String,
    },

    /// An option was supplied with an invalid value.
    #[error("invalid value: {value}: {field}")]
    InvalidValue {
        /// Name of the option
        field: String,
        /// The rejected value
        value: String,
    },

    /// Walking an input path failed.
    #[error("Error enumerating files under {path}: {reason}")]
    EnumerationFailed {
        /// The input designator being walked
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// An input file is not valid YAML/JSON.
    #[error("Failed to parse {file}: {reason}")]
    ParseError {
        /// Offending file designator
        file: String,
        /// Parser message
        reason: String,
    },

    /// A scanned value could not be parsed as a reference URL.
    #[error("Invalid reference {reference:?}: {reason}")]
    InvalidReference {
        /// The raw reference string
        reference: String,
        /// Parser message
        reason: String,
    },

    /// A no-authority scheme was written with an authority component.
    #[error(
        "unexpected host in {scheme:?} reference, got: {host} (did you mean {scheme}:/// instead of {scheme}://?)"
    )]
    UnexpectedHost {
        /// The reference scheme
        scheme: String,
        /// The host segment that should not be there
        host: String,
    },

    /// The expanded image name is not a valid image reference.
    #[error("invalid value: {reason}: image {image:?}")]
    InvalidImageName {
        /// Expanded image name
        image: String,
        /// Why it was rejected
        reason: String,
    },

    /// A builder produced something that is not a content digest.
    #[error("Invalid content digest: {value:?}")]
    InvalidDigest {
        /// The rejected value
        value: String,
    },

    /// A build strategy failed.
    #[error("Build of {reference} failed: {reason}")]
    BuildFailed {
        /// Reference being built
        reference: String,
        /// Failure description
        reason: String,
    },

    /// The dispatch scope was cancelled (interrupt or sibling failure).
    #[error("Build cancelled")]
    Cancelled,

    /// A reference reached substitution without a recorded result.
    #[error("resolved reference to {reference:?} not found")]
    MissingResult {
        /// The reference with no result
        reference: String,
    },

    /// A resolved value could not be written back into its document.
    #[error("Cannot substitute {value:?} in {file}: {reason}")]
    SubstitutionFailed {
        /// File holding the value
        file: String,
        /// The value being written
        value: String,
        /// Why it was refused
        reason: String,
    },

    /// Creating an output directory or file failed.
    #[error("Failed to write output {path}: {reason}")]
    OutputError {
        /// Destination path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// A git invocation exited unsuccessfully.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git subcommand
        operation: String,
        /// Captured stderr
        stderr: String,
    },

    /// Git is not installed.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A build executable could not be located.
    #[error("Executable '{name}' not found")]
    ExecutableNotFound {
        /// Executable name or path
        name: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error.
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl Clone for BuildrefError {
    fn clone(&self) -> Self {
        match self {
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::MissingField {
                field,
            } => Self::MissingField {
                field: field.clone(),
            },
            Self::InvalidValue {
                field,
                value,
            } => Self::InvalidValue {
                field: field.clone(),
                value: value.clone(),
            },
            Self::EnumerationFailed {
                path,
                reason,
            } => Self::EnumerationFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::ParseError {
                file,
                reason,
            } => Self::ParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::InvalidReference {
                reference,
                reason,
            } => Self::InvalidReference {
                reference: reference.clone(),
                reason: reason.clone(),
            },
            Self::UnexpectedHost {
                scheme,
                host,
            } => Self::UnexpectedHost {
                scheme: scheme.clone(),
                host: host.clone(),
            },
            Self::InvalidImageName {
                image,
                reason,
            } => Self::InvalidImageName {
                image: image.clone(),
                reason: reason.clone(),
            },
            Self::InvalidDigest {
                value,
            } => Self::InvalidDigest {
                value: value.clone(),
            },
            Self::BuildFailed {
                reference,
                reason,
            } => Self::BuildFailed {
                reference: reference.clone(),
                reason: reason.clone(),
            },
            Self::Cancelled => Self::Cancelled,
            Self::MissingResult {
                reference,
            } => Self::MissingResult {
                reference: reference.clone(),
            },
            Self::SubstitutionFailed {
                file,
                value,
                reason,
            } => Self::SubstitutionFailed {
                file: file.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::OutputError {
                path,
                reason,
            } => Self::OutputError {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::GitCommandError {
                operation,
                stderr,
            } => Self::GitCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::GitNotFound => Self::GitNotFound,
            Self::ExecutableNotFound {
                name,
            } => Self::ExecutableNotFound {
                name: name.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::YamlError(e) => Self::Other {
                message: format!("YAML error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// When displayed, the error is printed in red, details in yellow and the
/// suggestion in green.
///
/// ```rust,no_run
/// use buildref::core::{BuildrefError, ErrorContext};
///
/// let context = ErrorContext::new(BuildrefError::GitNotFound)
///     .with_suggestion("Install git from https://git-scm.com/")
///     .with_details("--detect-git reads the remote URL from the local repository");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: BuildrefError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: BuildrefError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with tailored suggestions.
///
/// [`BuildrefError`]s found anywhere in the chain get variant-specific advice;
/// IO errors get permission/not-found advice; everything else is reported with
/// its full `Caused by` chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(err) = error.chain().find_map(|cause| cause.downcast_ref::<BuildrefError>()) {
        let mut ctx = create_error_context(err.clone());
        // Keep outer context (e.g. "failed to build dockerfile:///app") visible
        let outer = error.to_string();
        if outer != ctx.error.to_string() && ctx.details.is_none() {
            ctx.details = Some(outer);
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(BuildrefError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion("Check file ownership and permissions of the input and output paths");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(BuildrefError::Other {
                    message: format!("Not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(BuildrefError::Other {
        message,
    })
}

fn create_error_context(error: BuildrefError) -> ErrorContext {
    match &error {
        BuildrefError::MissingField { field } if field == "filename" => ErrorContext::new(error.clone())
            .with_suggestion("Pass one or more -f/--filename arguments, or --allow-no-files"),

        BuildrefError::InvalidValue { field, .. } if field == "parallelism" => {
            ErrorContext::new(error.clone()).with_suggestion("Use a positive number, e.g. --parallelism 4")
        }

        BuildrefError::UnexpectedHost { scheme, host } => {
            let suggestion = format!("Write {scheme}:///{host} to build the '{host}' directory");
            ErrorContext::new(error.clone())
                .with_suggestion(suggestion)
                .with_details(format!("{scheme} references take a path, not a host"))
        }

        BuildrefError::ParseError { file, .. } => {
            let suggestion = format!("Check the YAML/JSON syntax of {file}");
            ErrorContext::new(error.clone()).with_suggestion(suggestion)
        }

        BuildrefError::InvalidImageName { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Pass --image as [registry/]repository[:tag]; $DIR_NAME expands to the reference directory"),

        BuildrefError::GitNotFound => ErrorContext::new(error.clone())
            .with_suggestion("Install git from https://git-scm.com/ or pass --git-url explicitly"),

        BuildrefError::ExecutableNotFound { name } => {
            let suggestion = format!("Install '{name}' or point buildref at it with the matching --*-binary flag");
            ErrorContext::new(error.clone()).with_suggestion(suggestion)
        }

        BuildrefError::SubstitutionFailed { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Make sure references used as mapping keys resolve to distinct values"),

        BuildrefError::OutputError { .. } => ErrorContext::new(error.clone())
            .with_details("Files written before the failure are left in place"),

        BuildrefError::MissingResult { .. } => ErrorContext::new(error.clone())
            .with_details("Every dispatched reference must record a result; this is an internal error"),

        _ => ErrorContext::new(error.clone()),
    }
}
