//! Pull: walk the canonical chain from the recorded link and integrate once.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::state::{LeaseOperation, LocalSyncState};
use crate::vcs::VersionControl;
use reposync_protocol::{ChainEntry, CommitId, LinkPayload, ProtocolError};
use reposync_storage::BlobStore;
use tracing::{debug, info, warn};

impl<R: VersionControl, S: BlobStore> SyncEngine<R, S> {
    /// Applies every canonical link after the recorded one and integrates the
    /// result into the branch. Returns the number of links applied.
    ///
    /// Local state is written after each applied link, so an interrupted pull
    /// resumes where it stopped. Integration (replay of local-only commits, or
    /// a fast-forward of an unborn branch) runs once at the end, and also when
    /// an earlier pull fetched links but never integrated them.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Transport`] if the store fails
    /// - [`SyncError::Continuity`] if a link's baseline is not in local history
    /// - [`SyncError::Protocol`] or [`SyncError::Crypto`] for a link that does
    ///   not open or validate
    /// - [`SyncError::Integration`] if the final replay stops; per-link state
    ///   already written stays valid
    pub fn pull(&self) -> SyncResult<usize> {
        let _lease = self
            .state
            .acquire_lease(&self.config.instance_id, LeaseOperation::Pull)?;
        let branch = self.config.branch.as_str();
        let mut state = self.state.read()?;

        let chain = self.canonical_chain()?;
        let remaining = chain.after(state.as_ref().and_then(LocalSyncState::position));
        info!(links = remaining.len(), "pulling");

        let mut frontier: Option<CommitId> = None;
        let mut applied = 0usize;
        for (index, entry) in remaining.iter().enumerate() {
            let sealed = match self.store.get(&entry.name) {
                Ok(sealed) => sealed,
                Err(e) if e.is_not_found() && superseded_later(entry, &remaining[index + 1..]) => {
                    warn!(link = %entry.id, "link was replaced while pulling; skipping it");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let payload = self.open_link(entry, &sealed)?;

            let anchor = match frontier.clone() {
                Some(fetched) => Some(fetched),
                None => match state.as_ref().and_then(|s| s.last_included.clone()) {
                    Some(included) => Some(included),
                    None => self.repo.head_commit(branch)?,
                },
            };
            self.check_continuity(payload.baseline.as_ref(), anchor)?;

            frontier = Some(self.repo.apply_delta(&payload.delta)?);
            applied += 1;

            let advances = match state.as_ref().and_then(|s| s.last_included.as_ref()) {
                None => true,
                Some(included) => self.repo.is_ancestor(included, &payload.head)?,
            };
            if advances {
                let next = LocalSyncState::new(entry.id.clone(), payload.head, payload.baseline);
                self.state.write(&next)?;
                state = Some(next);
                debug!(link = %entry.id, "link applied");
            } else {
                warn!(
                    link = %entry.id,
                    "link does not descend from the recorded commit; state left unchanged"
                );
            }
        }

        self.integrate(frontier, state.as_ref())?;
        info!(applied, "pull complete");
        Ok(applied)
    }

    /// Decrypts, decodes and validates one link object.
    fn open_link(&self, entry: &ChainEntry, sealed: &[u8]) -> SyncResult<LinkPayload> {
        let plain = self.cipher.decrypt(sealed)?;
        let payload = LinkPayload::decode(&plain)?;

        let invalid = |reason: String| {
            SyncError::Protocol(ProtocolError::Payload(format!("{}: {reason}", entry.name)))
        };
        if payload.link != entry.name {
            return Err(invalid(format!("payload was written for {}", payload.link)));
        }
        if payload.delta.is_empty() {
            return Err(invalid("empty delta".into()));
        }
        let head = self.repo.delta_head_commit(&payload.delta)?;
        if head != payload.head {
            return Err(invalid(format!(
                "declared head {} but delta carries {}",
                payload.head.short(),
                head.short()
            )));
        }
        let baseline = self.repo.delta_baseline_requirement(&payload.delta)?;
        if baseline != payload.baseline {
            return Err(invalid("declared baseline does not match the delta".into()));
        }
        Ok(payload)
    }

    fn check_continuity(
        &self,
        baseline: Option<&CommitId>,
        anchor: Option<CommitId>,
    ) -> SyncResult<()> {
        let Some(baseline) = baseline else {
            return Ok(());
        };
        let contained = match &anchor {
            Some(anchor) => self.repo.is_ancestor(baseline, anchor)?,
            None => false,
        };
        if contained {
            Ok(())
        } else {
            Err(SyncError::Continuity {
                baseline: baseline.clone(),
                anchor,
            })
        }
    }

    fn integrate(
        &self,
        frontier: Option<CommitId>,
        state: Option<&LocalSyncState>,
    ) -> SyncResult<()> {
        let branch = self.config.branch.as_str();
        let head = self.repo.head_commit(branch)?;

        let target = match frontier {
            Some(frontier) => frontier,
            None => {
                let Some(included) = state.and_then(|s| s.last_included.clone()) else {
                    return Ok(());
                };
                let integrated = match &head {
                    Some(head) => self.repo.is_ancestor(&included, head)?,
                    None => false,
                };
                if integrated {
                    return Ok(());
                }
                info!(commit = %included.short(), "integrating links fetched by an earlier pull");
                included
            }
        };

        match head {
            Some(_) => self.repo.replay_onto(branch, &target),
            None => self.repo.fast_forward_onto(branch, &target),
        }
    }
}

/// A missing open link is fine if a later generation of its position follows.
fn superseded_later(entry: &ChainEntry, rest: &[ChainEntry]) -> bool {
    !entry.id.is_final && rest.iter().any(|next| next.id.number == entry.id.number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reposync_protocol::LinkId;

    fn entry(number: u64, generation: u32, is_final: bool) -> ChainEntry {
        let id = LinkId::new(number, generation, "a", 1, is_final, "n");
        ChainEntry {
            name: id.encode().unwrap(),
            id,
            upload_timestamp: 1,
        }
    }

    #[test]
    fn missing_open_link_skippable_only_with_successor() {
        let first = entry(3, 1, false);
        assert!(superseded_later(&first, &[entry(3, 2, false)]));
        assert!(!superseded_later(&first, &[]));
        assert!(!superseded_later(&first, &[entry(4, 1, false)]));
        assert!(!superseded_later(&entry(3, 1, true), &[entry(3, 2, false)]));
    }
}
