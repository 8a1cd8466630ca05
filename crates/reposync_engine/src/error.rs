//! Error types for the sync engine.

use reposync_protocol::{CommitId, ProtocolError};
use reposync_storage::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during push or pull.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A blob store call failed.
    #[error("transport error: {0}")]
    Transport(#[from] StoreError),

    /// The chain moved under the writer; pull and retry.
    #[error("conflict: link {uploaded} lost to {}; pull and retry", .canonical_tail.as_deref().unwrap_or("an empty chain"))]
    Conflict {
        /// Object name of the link that was uploaded and then evicted.
        uploaded: String,
        /// Last canonical entry observed after the upload.
        canonical_tail: Option<String>,
    },

    /// A delta's baseline is not contained in local history.
    #[error("continuity error: baseline {baseline} is not contained in {}", describe_anchor(.anchor))]
    Continuity {
        /// Commit the delta requires.
        baseline: CommitId,
        /// Commit the baseline was checked against.
        anchor: Option<CommitId>,
    },

    /// Link naming or payload error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The version-control collaborator failed.
    #[error("version control error: {0}")]
    Vcs(String),

    /// Encryption or decryption failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The final replay or fast-forward failed.
    #[error("integration failed: {0}")]
    Integration(String),

    /// A previous operation did not release its lease.
    #[error("lease held by {owner} for {operation} since {acquired_at_ms} ms; run release-lease if it is stale")]
    LeaseHeld {
        /// Instance that took the lease.
        owner: String,
        /// Operation that was running.
        operation: String,
        /// When the lease was taken (Unix milliseconds).
        acquired_at_ms: u64,
    },

    /// Local sync state could not be read or written.
    #[error("state error: {0}")]
    State(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_anchor(anchor: &Option<CommitId>) -> String {
    match anchor {
        Some(commit) => format!("history at {}", commit.short()),
        None => "empty local history".to_string(),
    }
}

impl SyncError {
    /// Returns true if this is a lost upload race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict { .. })
    }

    /// Returns true if pulling first and then retrying can succeed.
    pub fn is_retryable_after_pull(&self) -> bool {
        match self {
            SyncError::Conflict { .. } => true,
            // A link was garbage collected between listing and download.
            SyncError::Transport(e) => e.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_classification() {
        let err = SyncError::Conflict {
            uploaded: "mine".into(),
            canonical_tail: Some("theirs".into()),
        };
        assert!(err.is_conflict());
        assert!(err.is_retryable_after_pull());
        assert!(err.to_string().contains("theirs"));

        let err = SyncError::Transport(StoreError::NotFound("x".into()));
        assert!(!err.is_conflict());
        assert!(err.is_retryable_after_pull());

        let err = SyncError::Integration("rebase stopped".into());
        assert!(!err.is_retryable_after_pull());
    }

    #[test]
    fn continuity_display() {
        let err = SyncError::Continuity {
            baseline: CommitId::new("abcdef0123456789").unwrap(),
            anchor: None,
        };
        let text = err.to_string();
        assert!(text.contains("abcdef0123456789"));
        assert!(text.contains("empty local history"));

        let err = SyncError::Continuity {
            baseline: CommitId::new("abcd").unwrap(),
            anchor: Some(CommitId::new("0123456789abcdef").unwrap()),
        };
        assert!(err.to_string().contains("0123456789"));
    }
}
