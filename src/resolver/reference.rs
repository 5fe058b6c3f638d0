//! Parsed build references (`scheme:///path` or `scheme://host/path`).

use anyhow::Result;
use std::fmt;
use url::Url;

use crate::core::BuildrefError;

/// A build reference as it appeared in a document, plus its parsed parts.
///
/// The raw string is kept verbatim (trimmed) and is the identity used for
/// deduplication: two references are the same build only if their strings
/// are equal.
///
/// ```rust
/// use buildref::resolver::Reference;
///
/// let reference = Reference::parse("dockerfile:///services/api").unwrap();
/// assert_eq!(reference.scheme(), "dockerfile");
/// assert_eq!(reference.host(), "");
/// assert_eq!(reference.relative_path(), "services/api");
/// assert_eq!(reference.dir_name(), "api");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    raw: String,
    scheme: String,
    host: String,
    path: String,
}

impl Reference {
    /// Parses a reference using generic URL syntax.
    ///
    /// # Errors
    ///
    /// Returns [`BuildrefError::InvalidReference`] when the string is not a
    /// valid `scheme://...` URL.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = |reason: String| BuildrefError::InvalidReference {
            reference: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        let scheme = url.scheme().to_string();
        let rest = raw
            .get(scheme.len()..)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| invalid("expected <scheme>://".to_string()))?;

        // The path is taken verbatim so dot segments survive.
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let path = rest.find('/').map_or("", |i| &rest[i..]).to_string();

        Ok(Self {
            raw: raw.to_string(),
            scheme,
            host: url.host_str().unwrap_or_default().to_string(),
            path,
        })
    }

    /// The reference exactly as scanned (trimmed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Authority component; empty for `scheme:///path`.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Path component including its leading `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Everything after `scheme://`.
    pub fn opaque(&self) -> &str {
        self.raw.get(self.scheme.len() + 3..).unwrap_or_default()
    }

    /// Path without the leading `/`, or `.` for the root.
    pub fn relative_path(&self) -> &str {
        match self.path.trim_start_matches('/') {
            "" => ".",
            rel => rel,
        }
    }

    /// Final component of the path, used for `$DIR_NAME` in image templates.
    pub fn dir_name(&self) -> &str {
        self.path.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
    }

    /// Fails with [`BuildrefError::UnexpectedHost`] if an authority is present.
    pub fn require_no_authority(&self) -> Result<()> {
        if self.host.is_empty() {
            Ok(())
        } else {
            Err(BuildrefError::UnexpectedHost {
                scheme: self.scheme.clone(),
                host: self.host.clone(),
            }
            .into())
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
