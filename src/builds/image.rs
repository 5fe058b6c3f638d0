//! Image name templates.
//!
//! The configured image may reference environment variables (`$VAR` or
//! `${VAR}`). `$DIR_NAME` falls back to the last component of the reference
//! path, so one template can name images for many build directories:
//!
//! ```text
//! gcr.io/project/$DIR_NAME:latest + dockerfile:///helloworld-go
//!   -> gcr.io/project/helloworld-go:latest
//! ```

use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;

use crate::config::EnvLookup;
use crate::core::BuildrefError;

/// Variable substituted with the reference's directory name when unset.
pub const DIR_NAME_VAR: &str = "DIR_NAME";

/// `[registry[:port]/]repository[/repository...][:tag]` with lowercase
/// repository components.
fn image_name_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:[a-zA-Z0-9.-]+(?::[0-9]+)?/)?[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*(?::[A-Za-z0-9_][A-Za-z0-9_.-]{0,127})?$",
        )
        .ok()
    })
    .as_ref()
}

/// An unexpanded image name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTemplate(String);

impl ImageTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Expands variables and validates the resulting name.
    ///
    /// Unknown variables expand to the empty string.
    ///
    /// # Errors
    ///
    /// [`BuildrefError::InvalidImageName`] when the expansion is not a valid
    /// image name.
    pub fn expand(&self, dir_name: &str, env: &EnvLookup) -> Result<String> {
        let expanded = shellexpand::env_with_context_no_errors(&self.0, |var: &str| {
            Some(env(var).unwrap_or_else(|| {
                if var == DIR_NAME_VAR {
                    dir_name.to_string()
                } else {
                    String::new()
                }
            }))
        })
        .into_owned();

        validate_image_name(&expanded)?;
        Ok(expanded)
    }
}

/// Weak validation of an image name with an optional tag.
pub fn validate_image_name(image: &str) -> Result<()> {
    let reason = if image.is_empty() {
        Some("image name is empty")
    } else if image_name_regex().is_some_and(|re| !re.is_match(image)) {
        Some("not a valid image name")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(BuildrefError::InvalidImageName {
            image: image.to_string(),
            reason: reason.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}
