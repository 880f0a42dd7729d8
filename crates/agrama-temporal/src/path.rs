use std::fmt;
use std::sync::Arc;

use crate::error::TemporalError;

/// First-segment allow-list for file-like path identifiers, plus a
/// backward-compat exception for paths with no separator at all. Bare
/// identifiers like `authentication-middleware` predate the allow-list
/// and must keep working.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    pub allowed_prefixes: Vec<String>,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self {
            allowed_prefixes: [
                "src", "docs", "memory", "tasks", "sessions", "notes", "tests", "config",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// An opaque entity identifier. Immutable once constructed; cheap to clone
/// via `Arc<str>` sharing since the same path string is a key in several
/// backends (temporal store, semantic index, lexical postings, graph
/// adjacency) at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Arc<str>);

impl Path {
    /// Validates `raw` against the configured path grammar and, if it
    /// passes, returns an immutable `Path`. Validation happens before any
    /// state mutation — callers that violate the grammar are rejected
    /// outright.
    pub fn parse(raw: &str, policy: &PathPolicy) -> Result<Self, TemporalError> {
        validate(raw, policy)?;
        Ok(Self(Arc::from(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::borrow::Borrow<str> for Path {
    fn borrow(&self) -> &str {
        &self.0
    }
}

fn validate(raw: &str, policy: &PathPolicy) -> Result<(), TemporalError> {
    if raw.is_empty() {
        return Err(TemporalError::InvalidPath("empty path".into()));
    }
    if raw.contains('\0') {
        return Err(TemporalError::InvalidPath("contains a null byte".into()));
    }
    if raw.starts_with('/') {
        return Err(TemporalError::InvalidPath("absolute path (leading '/')".into()));
    }
    // Windows-style drive prefix: a single ASCII letter followed by ':'.
    let mut chars = raw.chars();
    if let (Some(first), Some(':')) = (chars.next(), chars.next()) {
        if first.is_ascii_alphabetic() {
            return Err(TemporalError::InvalidPath("drive-letter path".into()));
        }
    }
    if raw.to_ascii_lowercase().contains("%2e%2e") {
        return Err(TemporalError::InvalidPath("percent-encoded parent segment".into()));
    }
    for segment in raw.split(['/', '\\']) {
        if segment == ".." {
            return Err(TemporalError::InvalidPath("parent-directory segment".into()));
        }
    }

    if raw.contains('/') {
        let first_segment = raw.split('/').next().unwrap_or("");
        if !policy
            .allowed_prefixes
            .iter()
            .any(|p| p == first_segment)
        {
            return Err(TemporalError::InvalidPath(format!(
                "first segment '{first_segment}' is not in the allowed-prefix list"
            )));
        }
    }
    // Paths with no separator at all are exempt (backward-compat exception).

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PathPolicy {
        PathPolicy::default()
    }

    #[test]
    fn adversarial_corpus_is_rejected() {
        let p = policy();
        for bad in ["../x", "/etc/passwd", "%2e%2e/x", "x\0y", "C:\\x"] {
            assert!(Path::parse(bad, &p).is_err(), "expected rejection of {bad:?}");
        }
    }

    #[test]
    fn positive_corpus_is_accepted() {
        let p = policy();
        for good in ["src/a", "authentication-middleware", "docs/readme", "tests/case_1"] {
            assert!(Path::parse(good, &p).is_ok(), "expected acceptance of {good:?}");
        }
    }

    #[test]
    fn unlisted_prefix_with_separator_is_rejected() {
        let p = policy();
        assert!(Path::parse("random/thing", &p).is_err());
    }

    #[test]
    fn case_insensitive_percent_encoding_is_rejected() {
        let p = policy();
        assert!(Path::parse("a/%2E%2E/b", &p).is_err());
    }
}
