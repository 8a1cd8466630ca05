//! Store target parsing.

use crate::b2::B2CliStore;
use crate::directory::DirectoryBlobStore;
use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryBlobStore;
use crate::store::BlobStore;
use std::fmt;
use std::path::PathBuf;

/// Where the shared link objects live.
///
/// Accepted forms:
/// - `b2:<bucket>` - a Backblaze B2 bucket
/// - `dir:<path>` or a bare path - a shared directory
/// - `memory:` - a throwaway in-process store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    /// Backblaze B2 bucket.
    B2 {
        /// Bucket name.
        bucket: String,
    },
    /// Shared directory.
    Directory {
        /// Directory path.
        path: PathBuf,
    },
    /// In-process memory store.
    Memory,
}

impl StoreTarget {
    /// Parses a target string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTarget`] for empty targets, missing
    /// bucket/path parts and unknown schemes.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StoreError::InvalidTarget("store target is required".into()));
        }

        if let Some(bucket) = raw.strip_prefix("b2:") {
            let bucket = bucket.trim_start_matches("//").trim_matches('/');
            if bucket.is_empty() {
                return Err(StoreError::InvalidTarget(format!("missing bucket: {raw}")));
            }
            return Ok(StoreTarget::B2 {
                bucket: bucket.to_string(),
            });
        }

        if let Some(path) = raw.strip_prefix("dir:") {
            if path.is_empty() {
                return Err(StoreError::InvalidTarget(format!("missing path: {raw}")));
            }
            return Ok(StoreTarget::Directory {
                path: PathBuf::from(path),
            });
        }

        if raw == "memory:" {
            return Ok(StoreTarget::Memory);
        }

        if raw.contains("://") || has_scheme(raw) {
            return Err(StoreError::InvalidTarget(format!("unsupported scheme: {raw}")));
        }

        Ok(StoreTarget::Directory {
            path: PathBuf::from(raw),
        })
    }

    /// Opens the store this target describes.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory store cannot be created.
    pub fn open(&self) -> StoreResult<Box<dyn BlobStore>> {
        Ok(match self {
            StoreTarget::B2 { bucket } => Box::new(B2CliStore::new(bucket.clone())),
            StoreTarget::Directory { path } => Box::new(DirectoryBlobStore::open(path)?),
            StoreTarget::Memory => Box::new(InMemoryBlobStore::new()),
        })
    }
}

/// True for `word:rest` prefixes; single letters are left alone for drive paths.
fn has_scheme(raw: &str) -> bool {
    match raw.split_once(':') {
        Some((scheme, _)) => scheme.len() > 1 && scheme.chars().all(|c| c.is_ascii_alphabetic()),
        None => false,
    }
}

impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreTarget::B2 { bucket } => write!(f, "b2:{bucket}"),
            StoreTarget::Directory { path } => write!(f, "dir:{}", path.display()),
            StoreTarget::Memory => write!(f, "memory:"),
        }
    }
}
