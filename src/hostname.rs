//! Hostname canonicalization and pattern matching.
//!
//! Hostnames are compared after [`normalize`]: ASCII lowercase with a
//! single trailing dot removed. A registered pattern is one of:
//!
//! * `"*"`, the default identity which matches any hostname,
//! * an exact hostname such as `example.com`,
//! * a wildcard such as `*.example.com`, which matches exactly one extra
//!   leading label: `foo.example.com` but neither `example.com` nor
//!   `bar.foo.example.com`.

use std::fmt;

use crate::provider::TlsProviderError;

/// The reserved hostname denoting the default identity.
pub const ANY_HOST: &str = "*";

/// Canonicalize a hostname for comparison.
pub fn normalize(hostname: &str) -> String {
    if hostname == ANY_HOST {
        return ANY_HOST.into();
    }
    hostname
        .strip_suffix('.')
        .unwrap_or(hostname)
        .to_ascii_lowercase()
}

/// A validated, normalized hostname pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HostnamePattern {
    /// `"*"`: matches any hostname.
    Any,
    /// A single hostname.
    Exact(String),
    /// `*.<suffix>`. Holds the suffix without the leading `*.`.
    Wildcard(String),
}

impl HostnamePattern {
    /// Normalize and classify `pattern`.
    ///
    /// Empty hostnames, empty labels and `*` appearing anywhere other than
    /// as the entire leftmost label are rejected.
    pub fn parse(pattern: &str) -> Result<Self, TlsProviderError> {
        let normalized = normalize(pattern);
        if normalized == ANY_HOST {
            return Ok(Self::Any);
        }
        let (wildcard, name) = match normalized.strip_prefix("*.") {
            Some(suffix) => (true, suffix),
            None => (false, normalized.as_str()),
        };
        if name.is_empty()
            || name
                .split('.')
                .any(|label| label.is_empty() || label.contains('*'))
        {
            return Err(TlsProviderError::InvalidHostname(pattern.to_owned()));
        }
        Ok(if wildcard {
            Self::Wildcard(name.to_owned())
        } else {
            Self::Exact(normalized)
        })
    }

    /// Test a hostname against this pattern. `hostname` must already have
    /// been passed through [`normalize`].
    pub fn matches(&self, hostname: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(name) => name == hostname,
            // Everything after the first label must be exactly the suffix,
            // which pins the label count to suffix + 1.
            Self::Wildcard(suffix) => hostname
                .split_once('.')
                .is_some_and(|(_, rest)| rest == suffix),
        }
    }
}

impl fmt::Display for HostnamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str(ANY_HOST),
            Self::Exact(name) => f.write_str(name),
            Self::Wildcard(suffix) => write!(f, "*.{}", suffix),
        }
    }
}

/// Convenience for testing a raw pattern string against a raw hostname.
/// Invalid patterns match nothing.
pub fn matches(pattern: &str, hostname: &str) -> bool {
    HostnamePattern::parse(pattern)
        .map(|p| p.matches(&normalize(hostname)))
        .unwrap_or(false)
}
