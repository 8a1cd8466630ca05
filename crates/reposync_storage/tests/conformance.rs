//! Behavior every blob store backend must share.

use reposync_storage::{BlobStore, DirectoryBlobStore, InMemoryBlobStore, StoreTarget};
use tempfile::tempdir;

fn exercise(store: &dyn BlobStore) {
    assert!(store.list().unwrap().is_empty());

    store.put("alpha", b"first").unwrap();
    store.put("beta", b"second").unwrap();

    let listing = store.list().unwrap();
    assert_eq!(listing.len(), 2);
    assert!(listing.iter().any(|o| o.name == "alpha"));
    assert!(listing.iter().any(|o| o.name == "beta"));

    assert_eq!(store.get("beta").unwrap(), b"second");
    assert!(store.get("gamma").unwrap_err().is_not_found());

    store.delete("alpha").unwrap();
    store.delete("alpha").unwrap();
    let names: Vec<String> = store.list().unwrap().into_iter().map(|o| o.name).collect();
    assert_eq!(names, vec!["beta".to_string()]);
}

#[test]
fn memory_store_conformance() {
    exercise(&InMemoryBlobStore::new());
}

#[test]
fn directory_store_conformance() {
    let dir = tempdir().unwrap();
    exercise(&DirectoryBlobStore::open(dir.path()).unwrap());
}

#[test]
fn target_opens_directory_store() {
    let dir = tempdir().unwrap();
    let raw = format!("dir:{}", dir.path().join("bucket").display());
    let store = StoreTarget::parse(&raw).unwrap().open().unwrap();
    exercise(store.as_ref());
}
