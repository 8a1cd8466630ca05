//! Error types for the chain protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while naming, parsing or decoding links.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A store object name does not follow the link naming scheme.
    ///
    /// Callers listing a shared store treat this as "not one of ours" and
    /// ignore the object.
    #[error("malformed link name {name:?}: {reason}")]
    MalformedName {
        /// The offending name.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A link identifier cannot be encoded.
    #[error("invalid link identifier: {0}")]
    InvalidIdentifier(String),

    /// A commit identifier is not well formed.
    #[error("invalid commit id {0:?}")]
    InvalidCommit(String),

    /// A link payload envelope is structurally invalid.
    #[error("invalid link payload: {0}")]
    Payload(String),
}

impl ProtocolError {
    pub(crate) fn malformed(name: &str, reason: impl Into<String>) -> Self {
        Self::MalformedName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true for names that are simply not link objects.
    pub fn is_malformed_name(&self) -> bool {
        matches!(self, ProtocolError::MalformedName { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display_mentions_name() {
        let err = ProtocolError::malformed("notes.txt", "wrong field count");
        assert!(err.is_malformed_name());
        assert!(err.to_string().contains("notes.txt"));
        assert!(err.to_string().contains("wrong field count"));
    }
}
