//! In-memory blob store for testing.

use crate::error::{StoreError, StoreResult};
use crate::store::{BlobStore, ListedObject};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    upload_timestamp: u64,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, StoredObject>,
    clock: u64,
}

/// An in-memory blob store.
///
/// Upload timestamps come from an internal logical clock that advances by
/// one on every `put`, so the store imposes a strict total order on
/// uploads the way a real store's server clock does.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads (wrap it in
/// an `Arc` to share one store between several simulated instances).
///
/// # Example
///
/// ```rust
/// use reposync_storage::{BlobStore, InMemoryBlobStore};
///
/// let store = InMemoryBlobStore::new();
/// store.put("a", b"1").unwrap();
/// store.put("b", b"2").unwrap();
/// let listing = store.list().unwrap();
/// assert!(listing[0].upload_timestamp < listing[1].upload_timestamp);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    inner: RwLock<Inner>,
}

impl InMemoryBlobStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object with an explicit upload timestamp.
    ///
    /// Useful for reproducing races whose outcome depends on store order.
    /// The logical clock is advanced past `upload_timestamp`.
    pub fn insert_with_timestamp(&self, name: &str, data: &[u8], upload_timestamp: u64) {
        let mut inner = self.inner.write();
        inner.clock = inner.clock.max(upload_timestamp);
        inner.objects.insert(
            name.to_string(),
            StoredObject {
                data: data.to_vec(),
                upload_timestamp,
            },
        );
    }

    /// Returns the names of all stored objects in lexicographic order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.inner.read().objects.keys().cloned().collect()
    }

    /// Returns true if an object with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().objects.contains_key(name)
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().objects.len()
    }

    /// Returns true if the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().objects.is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn list(&self) -> StoreResult<Vec<ListedObject>> {
        let inner = self.inner.read();
        let mut listing: Vec<ListedObject> = inner
            .objects
            .iter()
            .map(|(name, object)| ListedObject::new(name.clone(), object.upload_timestamp))
            .collect();
        listing.sort_by_key(|entry| entry.upload_timestamp);
        Ok(listing)
    }

    fn put(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        if name.is_empty() {
            return Err(StoreError::InvalidName("empty object name".into()));
        }
        let mut inner = self.inner.write();
        inner.clock += 1;
        let upload_timestamp = inner.clock;
        inner.objects.insert(
            name.to_string(),
            StoredObject {
                data: data.to_vec(),
                upload_timestamp,
            },
        );
        Ok(())
    }

    fn get(&self, name: &str) -> StoreResult<Vec<u8>> {
        self.inner
            .read()
            .objects
            .get(name)
            .map(|object| object.data.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        self.inner.write().objects.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryBlobStore::new();
        assert!(store.is_empty());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn memory_put_get() {
        let store = InMemoryBlobStore::new();
        store.put("obj", b"payload").unwrap();
        assert_eq!(store.get("obj").unwrap(), b"payload");
        assert!(store.contains("obj"));
    }

    #[test]
    fn memory_timestamps_increase() {
        let store = InMemoryBlobStore::new();
        store.put("b", b"1").unwrap();
        store.put("a", b"2").unwrap();

        let listing = store.list().unwrap();
        assert_eq!(listing[0].name, "b");
        assert_eq!(listing[1].name, "a");
        assert!(listing[0].upload_timestamp < listing[1].upload_timestamp);
    }

    #[test]
    fn memory_get_missing_is_not_found() {
        let store = InMemoryBlobStore::new();
        let err = store.get("missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn memory_delete_is_idempotent() {
        let store = InMemoryBlobStore::new();
        store.put("obj", b"x").unwrap();
        store.delete("obj").unwrap();
        store.delete("obj").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn memory_empty_name_rejected() {
        let store = InMemoryBlobStore::new();
        assert!(matches!(
            store.put("", b"x"),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn memory_insert_with_timestamp_advances_clock() {
        let store = InMemoryBlobStore::new();
        store.insert_with_timestamp("early", b"x", 100);
        store.put("late", b"y").unwrap();

        let listing = store.list().unwrap();
        assert_eq!(listing[0].upload_timestamp, 100);
        assert_eq!(listing[1].upload_timestamp, 101);
    }

    #[test]
    fn memory_shared_through_arc() {
        let store = std::sync::Arc::new(InMemoryBlobStore::new());
        let other = std::sync::Arc::clone(&store);
        other.put("shared", b"x").unwrap();
        assert_eq!(BlobStore::get(&store, "shared").unwrap(), b"x");
    }
}
