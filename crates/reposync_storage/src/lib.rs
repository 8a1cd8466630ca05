//! # reposync storage
//!
//! Blob store trait and backends for reposync.
//!
//! A blob store is a flat, shared, eventually-consistent namespace of
//! immutable objects. Stores are **opaque**: they never interpret object
//! names or contents. The sync protocol layers its own ordering on top of
//! the names it writes.
//!
//! ## Guarantees Expected From a Store
//!
//! - `list` reflects every completed `put` (list-after-write)
//! - Each listed object carries an upload timestamp assigned by the store
//! - No conditional or atomic compare-and-swap put is assumed
//!
//! ## Available Backends
//!
//! - [`InMemoryBlobStore`] - For testing and single-process simulations
//! - [`DirectoryBlobStore`] - A directory on a shared or synced filesystem
//! - [`B2CliStore`] - Backblaze B2 through the `backblaze-b2` command-line tool
//!
//! ## Example
//!
//! ```rust
//! use reposync_storage::{BlobStore, InMemoryBlobStore};
//!
//! let store = InMemoryBlobStore::new();
//! store.put("greeting", b"hello world").unwrap();
//! assert_eq!(store.get("greeting").unwrap(), b"hello world");
//! assert_eq!(store.list().unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod b2;
mod directory;
mod error;
mod memory;
mod store;
mod target;

pub use b2::B2CliStore;
pub use directory::DirectoryBlobStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBlobStore;
pub use store::{BlobStore, ListedObject};
pub use target::StoreTarget;
