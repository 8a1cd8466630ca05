//! The sync engine and its shared plumbing.

use crate::cipher::Cipher;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::state::{Lease, LocalSyncState, StateStore};
use crate::vcs::VersionControl;
use reposync_protocol::{build_canonical_chain, CanonicalChain, CommitId};
use reposync_storage::BlobStore;
use tracing::{debug, warn};

/// Synchronizes one branch of one repository through a shared blob store.
///
/// The engine is stateless between calls: everything it knows about the
/// chain comes from a fresh listing, and everything it knows about itself
/// comes from the [`StateStore`]. Each [`push`](Self::push) and
/// [`pull`](Self::pull) holds the state store's lease while it runs.
pub struct SyncEngine<R: VersionControl, S: BlobStore> {
    pub(crate) config: SyncConfig,
    pub(crate) repo: R,
    pub(crate) store: S,
    pub(crate) cipher: Box<dyn Cipher>,
    pub(crate) state: StateStore,
}

/// Snapshot for `status` reporting.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// Recorded local progress.
    pub state: Option<LocalSyncState>,
    /// Current branch tip.
    pub head: Option<CommitId>,
    /// Canonical chain as currently listed.
    pub chain: CanonicalChain,
    /// Lease left behind by a running or interrupted operation.
    pub lease: Option<Lease>,
}

impl SyncStatus {
    /// Canonical links not yet applied locally.
    #[must_use]
    pub fn pending_links(&self) -> usize {
        let known = self.state.as_ref().and_then(LocalSyncState::position);
        self.chain.after(known).len()
    }

    /// Returns true if the branch has commits that were never pushed.
    #[must_use]
    pub fn has_unpushed_commits(&self) -> bool {
        match &self.head {
            None => false,
            Some(head) => self.state.as_ref().and_then(|s| s.last_included.as_ref()) != Some(head),
        }
    }
}

impl<R: VersionControl, S: BlobStore> SyncEngine<R, S> {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Config`] if the configuration is invalid.
    pub fn new(
        config: SyncConfig,
        repo: R,
        store: S,
        cipher: impl Cipher + 'static,
        state: StateStore,
    ) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            repo,
            store,
            cipher: Box::new(cipher),
            state,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Returns the blob store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the state store.
    pub fn state_store(&self) -> &StateStore {
        &self.state
    }

    /// Reads the recorded local progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file is unreadable.
    pub fn local_state(&self) -> SyncResult<Option<LocalSyncState>> {
        self.state.read()
    }

    /// Lists the store and builds the canonical chain.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Transport`] if the listing fails.
    pub fn canonical_chain(&self) -> SyncResult<CanonicalChain> {
        let listing = self.store.list()?;
        let chain =
            build_canonical_chain(listing.iter().map(|o| (o.name.as_str(), o.upload_timestamp)));
        if !chain.ignored().is_empty() {
            warn!(count = chain.ignored().len(), "ignoring store objects that are not links");
        }
        debug!(
            canonical = chain.len(),
            leftovers = chain.leftovers().len(),
            "canonical chain built"
        );
        Ok(chain)
    }

    /// Collects local state, branch tip, chain and lease without changing
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns an error if any of them cannot be read.
    pub fn status(&self) -> SyncResult<SyncStatus> {
        Ok(SyncStatus {
            state: self.state.read()?,
            head: self.repo.head_commit(&self.config.branch)?,
            chain: self.canonical_chain()?,
            lease: self.state.read_lease()?,
        })
    }
}
