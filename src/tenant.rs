//! Tenant namespace handling.
//!
//! Every query and transaction in the engine is scoped to one namespace.
//! The namespace is threaded through every call explicitly rather than
//! carried in ambient request state, so cross-tenant leakage shows up as
//! a missing parameter at compile time instead of a data bug in
//! production.

use crate::error::{PayrunError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a namespace string.
const MAX_NAMESPACE_LEN: usize = 64;

/// A validated tenant namespace.
///
/// Records from different namespaces are never summed, transferred, or
/// cached together. Store implementations key every record by the
/// namespace they were given.
///
/// # Example
///
/// ```rust
/// use payrun::Namespace;
///
/// let ns = Namespace::new("acme-store").unwrap();
/// assert_eq!(ns.as_str(), "acme-store");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Create a namespace, validating the tenant identifier.
    ///
    /// Accepts lowercase ASCII alphanumerics, `-` and `_`, up to 64
    /// characters. The restriction keeps namespaces usable as key
    /// prefixes in any backing store.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(PayrunError::InvalidNamespace("empty namespace".into()));
        }
        if name.len() > MAX_NAMESPACE_LEN {
            return Err(PayrunError::InvalidNamespace(format!(
                "namespace exceeds {} characters",
                MAX_NAMESPACE_LEN
            )));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
        {
            return Err(PayrunError::InvalidNamespace(format!(
                "namespace {:?} contains characters outside [a-z0-9-_]",
                name
            )));
        }
        Ok(Self(name))
    }

    /// The namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Namespace {
    type Err = PayrunError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_names() {
        for name in ["tenant-a", "acme_store", "org42"] {
            assert!(Namespace::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(Namespace::new("").is_err());
        assert!(Namespace::new("Tenant").is_err());
        assert!(Namespace::new("a/b").is_err());
        assert!(Namespace::new("x".repeat(65)).is_err());
    }

    #[test]
    fn parses_from_str() {
        let ns: Namespace = "tenant-a".parse().unwrap();
        assert_eq!(ns.to_string(), "tenant-a");
    }
}
