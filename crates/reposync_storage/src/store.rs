//! Blob store trait definition.

use crate::error::StoreResult;
use serde::{Deserialize, Serialize};

/// One entry of a store listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListedObject {
    /// Object name.
    pub name: String,
    /// Upload timestamp assigned by the store (milliseconds).
    ///
    /// This is the one ordering value every observer of the store agrees on.
    pub upload_timestamp: u64,
}

impl ListedObject {
    /// Creates a listing entry.
    pub fn new(name: impl Into<String>, upload_timestamp: u64) -> Self {
        Self {
            name: name.into(),
            upload_timestamp,
        }
    }
}

/// A shared store of immutable, named blobs.
///
/// Stores are **opaque byte stores**: they do not interpret names or
/// contents. Multiple independent writers may use the same store without
/// any coordination, so implementations must not assume exclusive access.
///
/// # Invariants
///
/// - `list` returns every object whose `put` has completed
/// - `upload_timestamp` is assigned by the store, not by the writer
/// - `put` never conditionally fails because another writer raced it
/// - `delete` of an absent object is not an error
///
/// # Implementors
///
/// - [`super::InMemoryBlobStore`] - For testing
/// - [`super::DirectoryBlobStore`] - For shared folders
/// - [`super::B2CliStore`] - For Backblaze B2
pub trait BlobStore: Send + Sync {
    /// Lists all objects in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be obtained or parsed.
    fn list(&self) -> StoreResult<Vec<ListedObject>>;

    /// Uploads an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    fn put(&self, name: &str, data: &[u8]) -> StoreResult<()>;

    /// Downloads an object.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotFound`] if the object does not exist,
    /// or another error if the download fails.
    fn get(&self, name: &str) -> StoreResult<Vec<u8>>;

    /// Deletes an object. Deleting an absent object succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    fn delete(&self, name: &str) -> StoreResult<()>;
}

impl<S: BlobStore + ?Sized> BlobStore for std::sync::Arc<S> {
    fn list(&self) -> StoreResult<Vec<ListedObject>> {
        (**self).list()
    }

    fn put(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        (**self).put(name, data)
    }

    fn get(&self, name: &str) -> StoreResult<Vec<u8>> {
        (**self).get(name)
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        (**self).delete(name)
    }
}

impl<S: BlobStore + ?Sized> BlobStore for Box<S> {
    fn list(&self) -> StoreResult<Vec<ListedObject>> {
        (**self).list()
    }

    fn put(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        (**self).put(name, data)
    }

    fn get(&self, name: &str) -> StoreResult<Vec<u8>> {
        (**self).get(name)
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        (**self).delete(name)
    }
}
