//! Push: upload one link, verify it is canonical, collect what it replaces.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::state::{now_ms, LeaseOperation, LocalSyncState};
use crate::vcs::VersionControl;
use reposync_protocol::{CanonicalChain, CommitId, LinkId, LinkPayload};
use reposync_storage::BlobStore;
use tracing::{debug, info, warn};

/// How a push relates to the last known link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    /// Open the next chain position.
    Extend,
    /// Replace the open position with a new generation.
    Amend,
}

impl PushMode {
    /// Extend after a final link or without any state; amend otherwise.
    #[must_use]
    pub fn for_state(state: Option<&LocalSyncState>) -> Self {
        match state.and_then(|s| s.last_link.as_ref()) {
            Some(link) if !link.is_final => PushMode::Amend,
            _ => PushMode::Extend,
        }
    }
}

/// Lifecycle of an uploaded link.
///
/// ```text
/// Uploaded ──(canonical tail)──▶ Verified
///     └────(anything else)─────▶ SelfEvicted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// The object is in the store but not yet checked against the chain.
    Uploaded,
    /// The object ends the canonical chain.
    Verified,
    /// The object lost a race and was deleted by its writer.
    SelfEvicted,
}

impl UploadState {
    /// Decides the outcome of an upload from a listing taken after it.
    #[must_use]
    pub fn after_listing(chain: &CanonicalChain, uploaded: &str) -> Self {
        match chain.last() {
            Some(tail) if tail.name == uploaded => UploadState::Verified,
            _ => UploadState::SelfEvicted,
        }
    }
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Nothing to upload.
    UpToDate,
    /// A link was uploaded and verified.
    Pushed {
        /// The new link.
        link: LinkId,
        /// Its object name.
        name: String,
        /// Whether it extended or amended the chain.
        mode: PushMode,
        /// Number of superseded objects deleted.
        collected: usize,
    },
}

struct LinkPlan {
    mode: PushMode,
    number: u64,
    generation: u32,
    baseline: Option<CommitId>,
}

impl LinkPlan {
    fn for_state(state: Option<&LocalSyncState>) -> Self {
        let mode = PushMode::for_state(state);
        let last = state.and_then(|s| s.last_link.as_ref());
        match (mode, state, last) {
            (PushMode::Amend, Some(state), Some(link)) => Self {
                mode,
                number: link.number,
                generation: link.generation + 1,
                baseline: state.last_required.clone(),
            },
            _ => Self {
                mode: PushMode::Extend,
                number: last.map_or(1, |link| link.number + 1),
                generation: 1,
                baseline: state.and_then(|s| s.last_included.clone()),
            },
        }
    }
}

impl<R: VersionControl, S: BlobStore> SyncEngine<R, S> {
    /// Uploads local commits as one chain link.
    ///
    /// Returns [`PushOutcome::UpToDate`] when the branch tip is already
    /// recorded (or the branch has no commits yet).
    ///
    /// # Errors
    ///
    /// - [`SyncError::Conflict`] if another instance won the position; the
    ///   uploaded object has been deleted and local state is unchanged
    /// - [`SyncError::Continuity`] if local history no longer contains the
    ///   baseline
    /// - [`SyncError::Transport`] if the store fails; local state is unchanged
    /// - [`SyncError::LeaseHeld`] if another operation holds the lease
    pub fn push(&self) -> SyncResult<PushOutcome> {
        let _lease = self
            .state
            .acquire_lease(&self.config.instance_id, LeaseOperation::Push)?;
        let branch = self.config.branch.as_str();
        let state = self.state.read()?;

        let Some(head) = self.repo.head_commit(branch)? else {
            info!(branch, "branch has no commits; nothing to push");
            return Ok(PushOutcome::UpToDate);
        };
        if state.as_ref().and_then(|s| s.last_included.as_ref()) == Some(&head) {
            info!(head = %head.short(), "already up to date");
            return Ok(PushOutcome::UpToDate);
        }

        let plan = LinkPlan::for_state(state.as_ref());
        if let Some(baseline) = &plan.baseline {
            if !self.repo.is_ancestor(baseline, &head)? {
                return Err(SyncError::Continuity {
                    baseline: baseline.clone(),
                    anchor: Some(head),
                });
            }
        }

        let delta = self.repo.create_delta(branch, plan.baseline.as_ref())?;
        let delta_len = delta.len();
        let link = LinkId::new(
            plan.number,
            plan.generation,
            self.config.instance_id.clone(),
            now_ms(),
            delta_len > self.config.target_link_size,
            uuid::Uuid::new_v4().simple().to_string(),
        );
        let name = link.encode()?;
        let payload = LinkPayload::new(name.clone(), plan.baseline.clone(), head.clone(), delta);
        let sealed = self.cipher.encrypt(&payload.encode()?)?;

        self.store.put(&name, &sealed)?;
        info!(%link, mode = ?plan.mode, delta_len, state = ?UploadState::Uploaded, "link uploaded");

        let chain = self.canonical_chain()?;
        match UploadState::after_listing(&chain, &name) {
            UploadState::Verified => {}
            _ => return Err(self.evict(name, &chain)),
        }
        info!(%link, state = ?UploadState::Verified, "link is canonical");

        let collected = self.collect_superseded(&chain, &link);
        self.state
            .write(&LocalSyncState::new(link.clone(), head, plan.baseline))?;

        Ok(PushOutcome::Pushed {
            link,
            name,
            mode: plan.mode,
            collected,
        })
    }

    /// Deletes our own losing upload and builds the conflict error.
    fn evict(&self, uploaded: String, chain: &CanonicalChain) -> SyncError {
        let canonical_tail = chain.last().map(|e| e.name.clone());
        warn!(
            uploaded = %uploaded,
            canonical_tail = ?canonical_tail,
            state = ?UploadState::SelfEvicted,
            "lost the race for this chain position"
        );
        // Left behind on failure; a later push collects it as a leftover.
        if let Err(e) = self.store.delete(&uploaded) {
            warn!(uploaded = %uploaded, error = %e, "failed to delete losing upload");
        }
        SyncError::Conflict {
            uploaded,
            canonical_tail,
        }
    }

    fn collect_superseded(&self, chain: &CanonicalChain, link: &LinkId) -> usize {
        let mut collected = 0;
        for entry in chain.superseded_by(link) {
            match self.store.delete(&entry.name) {
                Ok(()) => {
                    debug!(name = %entry.name, "deleted superseded link");
                    collected += 1;
                }
                Err(e) => warn!(name = %entry.name, error = %e, "failed to delete superseded link"),
            }
        }
        collected
    }
}
