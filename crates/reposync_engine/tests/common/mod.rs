//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use reposync_engine::{
    MemoryRepository, PassphraseCipher, PushOutcome, StateStore, SyncConfig, SyncEngine,
};
use reposync_protocol::LinkId;
use reposync_storage::{BlobStore, InMemoryBlobStore, ListedObject, StoreError, StoreResult};
use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const PASSPHRASE: &str = "correct horse battery staple";

/// Every delta is larger than one byte, so every link closes its position.
pub const ALWAYS_FINAL: usize = 1;

pub type MemoryEngine<S> = SyncEngine<MemoryRepository, S>;

pub fn engine<S: BlobStore>(
    instance: &str,
    store: S,
    root: &Path,
    target_link_size: usize,
) -> MemoryEngine<S> {
    SyncEngine::new(
        SyncConfig::new(instance).with_target_link_size(target_link_size),
        MemoryRepository::new(),
        store,
        PassphraseCipher::new(PASSPHRASE).unwrap(),
        StateStore::open(root.join(instance)).unwrap(),
    )
    .unwrap()
}

pub fn pushed_link(outcome: PushOutcome) -> (LinkId, String) {
    match outcome {
        PushOutcome::Pushed { link, name, .. } => (link, name),
        PushOutcome::UpToDate => panic!("expected a push, got UpToDate"),
    }
}

/// Commits `messages` and pushes them as one link.
pub fn commit_and_push<S: BlobStore>(engine: &MemoryEngine<S>, messages: &[&str]) -> (LinkId, String) {
    for message in messages {
        engine.repo().commit(message).unwrap();
    }
    pushed_link(engine.push().unwrap())
}

/// Fails every `get` after the first `allowed` ones.
pub struct FlakyStore {
    pub inner: Arc<InMemoryBlobStore>,
    gets_left: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryBlobStore>, allowed: usize) -> Self {
        Self {
            inner,
            gets_left: AtomicUsize::new(allowed),
        }
    }
}

impl BlobStore for FlakyStore {
    fn list(&self) -> StoreResult<Vec<ListedObject>> {
        self.inner.list()
    }

    fn put(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        self.inner.put(name, data)
    }

    fn get(&self, name: &str) -> StoreResult<Vec<u8>> {
        let left = self.gets_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
        self.gets_left.store(left - 1, Ordering::SeqCst);
        self.inner.get(name)
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        self.inner.delete(name)
    }
}

/// Lists some objects but answers `NotFound` when they are downloaded, as if
/// they were deleted between listing and download.
pub struct VanishingStore {
    pub inner: Arc<InMemoryBlobStore>,
    pub vanished: HashSet<String>,
}

impl BlobStore for VanishingStore {
    fn list(&self) -> StoreResult<Vec<ListedObject>> {
        self.inner.list()
    }

    fn put(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        self.inner.put(name, data)
    }

    fn get(&self, name: &str) -> StoreResult<Vec<u8>> {
        if self.vanished.contains(name) {
            return Err(StoreError::NotFound(name.to_string()));
        }
        self.inner.get(name)
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        self.inner.delete(name)
    }
}

/// Refuses every `delete` while `refuse_deletes` is set.
pub struct StickyStore {
    pub inner: Arc<InMemoryBlobStore>,
    pub refuse_deletes: AtomicBool,
}

impl StickyStore {
    pub fn new(inner: Arc<InMemoryBlobStore>) -> Self {
        Self {
            inner,
            refuse_deletes: AtomicBool::new(false),
        }
    }
}

impl BlobStore for StickyStore {
    fn list(&self) -> StoreResult<Vec<ListedObject>> {
        self.inner.list()
    }

    fn put(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        self.inner.put(name, data)
    }

    fn get(&self, name: &str) -> StoreResult<Vec<u8>> {
        self.inner.get(name)
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        if self.refuse_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "delete refused",
            )));
        }
        self.inner.delete(name)
    }
}

type Hook = Box<dyn FnOnce() + Send>;

/// Runs a one-shot hook around the next `put`, to interleave another
/// instance's whole push with this one's upload.
pub struct HookStore {
    pub inner: Arc<InMemoryBlobStore>,
    hook: Mutex<Option<Hook>>,
    hook_first: bool,
}

impl HookStore {
    /// `hook_first`: run the hook before this put lands (the hook wins the
    /// store order) or after it (this put wins).
    pub fn new(inner: Arc<InMemoryBlobStore>, hook_first: bool, hook: Hook) -> Self {
        Self {
            inner,
            hook: Mutex::new(Some(hook)),
            hook_first,
        }
    }

    fn run_hook(&self) {
        let hook = self.hook.lock().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl BlobStore for HookStore {
    fn list(&self) -> StoreResult<Vec<ListedObject>> {
        self.inner.list()
    }

    fn put(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        if self.hook_first {
            self.run_hook();
            self.inner.put(name, data)
        } else {
            self.inner.put(name, data)?;
            self.run_hook();
            Ok(())
        }
    }

    fn get(&self, name: &str) -> StoreResult<Vec<u8>> {
        self.inner.get(name)
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        self.inner.delete(name)
    }
}
