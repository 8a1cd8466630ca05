//! # reposync engine
//!
//! Push and pull engines for chain-based repository sync.
//!
//! This crate provides:
//! - [`SyncEngine`] with the push (extend or amend, verify, garbage collect)
//!   and pull (walk, fetch, integrate once) operations
//! - [`StateStore`], the per-repository local sync state with its lease guard
//! - Collaborator seams: [`VersionControl`], [`Cipher`] and [`Notifier`]
//! - Implementations: [`GitCli`], [`PassphraseCipher`], [`DesktopNotifier`],
//!   [`LogNotifier`] and the in-memory [`MemoryRepository`]
//!
//! ## Architecture
//!
//! There is no coordination between instances. Every writer uploads its link
//! and then re-reads the store listing: if the canonical chain does not end
//! with its own link, it lost a race, deletes its upload and reports a
//! conflict. Readers derive the same canonical chain from the same listing.
//!
//! ## Key Invariants
//!
//! - Local sync state only ever changes after a verified push or per applied
//!   link during pull
//! - A delta is applied only if its baseline is already in local history
//! - An instance deletes only objects it lost with or proved superseded
//! - Integration into the working branch happens once per pull

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cipher;
mod config;
mod engine;
mod error;
mod git;
mod memory;
mod notify;
mod pull;
mod push;
mod state;
mod vcs;

pub use cipher::{Cipher, PassphraseCipher};
pub use config::{
    validate_instance_id, ConfigFile, SyncConfig, CONFIG_FILE_NAME, DEFAULT_BRANCH,
    DEFAULT_METADATA_DIR, DEFAULT_TARGET_LINK_SIZE,
};
pub use engine::{SyncEngine, SyncStatus};
pub use error::{SyncError, SyncResult};
pub use git::{BundleHeader, GitCli};
pub use memory::{MemoryCommit, MemoryRepository};
pub use notify::{DesktopNotifier, LogNotifier, Notifier, Severity};
pub use push::{PushMode, PushOutcome, UploadState};
pub use state::{Lease, LeaseGuard, LeaseOperation, LocalSyncState, StateStore};
pub use vcs::VersionControl;
