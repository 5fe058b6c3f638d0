//! Content-addressed artifact identifiers.

use anyhow::Result;
use std::fmt;

use crate::core::BuildrefError;

/// Minimum number of hex characters accepted in a digest.
const MIN_HEX_LEN: usize = 32;

/// An artifact name plus the digest of its content, written `name@alg:hex`.
///
/// ```rust
/// use buildref::builds::ContentDigest;
///
/// let digest = ContentDigest::parse(
///     "gcr.io/project/app:latest",
///     "sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
/// )
/// .unwrap();
/// assert_eq!(
///     digest.to_string(),
///     "gcr.io/project/app:latest@sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    name: String,
    digest: String,
}

impl ContentDigest {
    /// Validates `digest` (`alg:hex`) and pairs it with `name`.
    pub fn new(name: impl Into<String>, digest: &str) -> Result<Self> {
        let digest = digest.trim();
        let valid = digest.split_once(':').is_some_and(|(alg, hex)| {
            !alg.is_empty()
                && alg.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '_' | '-'))
                && hex.len() >= MIN_HEX_LEN
                && hex.chars().all(|c| c.is_ascii_hexdigit())
        });
        if !valid {
            return Err(BuildrefError::InvalidDigest {
                value: digest.to_string(),
            }
            .into());
        }
        Ok(Self {
            name: name.into(),
            digest: digest.to_string(),
        })
    }

    /// Parses either a bare `alg:hex` digest, named `default_name`, or a full
    /// `name@alg:hex` reference, whose own name wins.
    pub fn parse(default_name: &str, text: &str) -> Result<Self> {
        let text = text.trim();
        match text.rsplit_once('@') {
            Some((name, digest)) if !name.is_empty() => Self::new(name, digest),
            Some(_) => Err(BuildrefError::InvalidDigest {
                value: text.to_string(),
            }
            .into()),
            None => Self::new(default_name, text),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `alg:hex` part.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "a3f1c0ffee0123456789abcdef0123456789abcdef0123456789abcdef012345";

    #[test]
    fn test_parse_bare_digest() {
        let d = ContentDigest::parse("registry.local/app", &format!("sha256:{HEX}\n")).unwrap();
        assert_eq!(d.name(), "registry.local/app");
        assert_eq!(d.digest(), format!("sha256:{HEX}"));
    }

    #[test]
    fn test_parse_full_reference_keeps_its_name() {
        let d = ContentDigest::parse("ignored", &format!("ko.local/tool@sha256:{HEX}")).unwrap();
        assert_eq!(d.to_string(), format!("ko.local/tool@sha256:{HEX}"));
    }

    #[test]
    fn test_rejects_malformed_digests() {
        for bad in ["", "sha256", "sha256:xyz", "sha256:abc", ":0123456789abcdef0123456789abcdef", "@sha256:abc"] {
            let err = ContentDigest::parse("app", bad).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<BuildrefError>(), Some(BuildrefError::InvalidDigest { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
