//! Commit identifier.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a version-control commit.
///
/// A lowercase hexadecimal object name (40 characters for SHA-1
/// repositories, 64 for SHA-256). Abbreviated names are accepted down to
/// four characters so test doubles can use short ids.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

impl CommitId {
    /// Parses a commit id, normalizing to lowercase.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidCommit`] unless the input is 4 to 64
    /// hexadecimal characters.
    pub fn new(raw: impl AsRef<str>) -> ProtocolResult<Self> {
        let raw = raw.as_ref().trim();
        if raw.len() < 4 || raw.len() > 64 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidCommit(raw.to_string()));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    /// Returns the full hexadecimal id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns an abbreviated id for log output.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(10)]
    }
}

impl fmt::Debug for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitId({})", self.short())
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CommitId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommitId> for String {
    fn from(id: CommitId) -> Self {
        id.0
    }
}

impl std::str::FromStr for CommitId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_sha1_and_normalizes_case() {
        let id = CommitId::new("ABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        assert_eq!(id.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(id.short(), "abcdef0123");
    }

    #[test]
    fn rejects_non_hex_and_bad_lengths() {
        assert!(CommitId::new("xyz1").is_err());
        assert!(CommitId::new("abc").is_err());
        assert!(CommitId::new("a".repeat(65)).is_err());
        assert!(CommitId::new("").is_err());
    }

    #[test]
    fn short_ids_are_not_truncated_further() {
        let id = CommitId::new("beef").unwrap();
        assert_eq!(id.short(), "beef");
    }

    #[test]
    fn parses_via_from_str() {
        let id: CommitId = "deadbeef".parse().unwrap();
        assert_eq!(id.to_string(), "deadbeef");
    }
}
