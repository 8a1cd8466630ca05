//! Error types for blob store operations.

use std::io;
use thiserror::Error;

/// Result type for blob store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a blob store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// An external store client exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Command {
        /// The program that was run.
        program: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The store returned a listing that could not be interpreted.
    #[error("invalid listing: {0}")]
    InvalidListing(String),

    /// The object name is not acceptable for this store.
    #[error("invalid object name: {0}")]
    InvalidName(String),

    /// A store target string could not be parsed.
    #[error("invalid store target: {0}")]
    InvalidTarget(String),
}

impl StoreError {
    /// Returns true if the error means the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
