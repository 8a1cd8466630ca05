//! In-memory version control for tests and simulations.

use crate::error::{SyncError, SyncResult};
use crate::vcs::VersionControl;
use parking_lot::RwLock;
use reposync_protocol::CommitId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// One commit of a [`MemoryRepository`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCommit {
    /// Commit id (hash of parent and message).
    pub id: CommitId,
    /// Parent commit; `None` for a root commit.
    pub parent: Option<CommitId>,
    /// Commit message.
    pub message: String,
}

impl MemoryCommit {
    fn new(parent: Option<CommitId>, message: &str) -> SyncResult<Self> {
        let mut hasher = Sha256::new();
        if let Some(parent) = &parent {
            hasher.update(parent.as_str().as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(message.as_bytes());
        let hex: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        Ok(Self {
            id: CommitId::new(hex)?,
            parent,
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MemoryDelta {
    baseline: Option<CommitId>,
    head: CommitId,
    /// Oldest first.
    commits: Vec<MemoryCommit>,
}

#[derive(Debug, Default)]
struct Inner {
    commits: HashMap<CommitId, MemoryCommit>,
    head: Option<CommitId>,
    frontier: Option<CommitId>,
    fail_integration: bool,
}

impl Inner {
    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> bool {
        if !self.commits.contains_key(ancestor) {
            return false;
        }
        let mut cursor = Some(descendant);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.commits.get(id).and_then(|c| c.parent.as_ref());
        }
        false
    }

    /// Commits from the root to `tip`, oldest first.
    fn lineage(&self, tip: Option<&CommitId>) -> Vec<MemoryCommit> {
        let mut out = Vec::new();
        let mut cursor = tip;
        while let Some(id) = cursor {
            match self.commits.get(id) {
                Some(commit) => {
                    out.push(commit.clone());
                    cursor = commit.parent.as_ref();
                }
                None => break,
            }
        }
        out.reverse();
        out
    }
}

/// A single-branch, linear-history repository held in memory.
///
/// Commit ids are SHA-256 over parent and message, so replaying a commit
/// onto a new parent yields a new id, as with git. Deltas are JSON lists of
/// commits. The branch name passed to trait methods is not interpreted.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    /// Creates an empty repository (unborn branch).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a commit on top of the branch and returns its id.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the id is always well formed.
    pub fn commit(&self, message: &str) -> SyncResult<CommitId> {
        let mut inner = self.inner.write();
        let commit = MemoryCommit::new(inner.head.clone(), message)?;
        let id = commit.id.clone();
        inner.commits.insert(id.clone(), commit);
        inner.head = Some(id.clone());
        Ok(id)
    }

    /// Returns the branch tip.
    pub fn head(&self) -> Option<CommitId> {
        self.inner.read().head.clone()
    }

    /// Returns the last frontier set by [`VersionControl::apply_delta`].
    pub fn frontier(&self) -> Option<CommitId> {
        self.inner.read().frontier.clone()
    }

    /// Commit messages on the branch, oldest first.
    pub fn history(&self) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .lineage(inner.head.as_ref())
            .into_iter()
            .map(|c| c.message)
            .collect()
    }

    /// Returns true if the commit is stored (on the branch or not).
    pub fn contains(&self, id: &CommitId) -> bool {
        self.inner.read().commits.contains_key(id)
    }

    /// Makes the next integrations fail, as a conflicting rebase would.
    pub fn set_fail_integration(&self, fail: bool) {
        self.inner.write().fail_integration = fail;
    }

    fn decode(delta: &[u8]) -> SyncResult<MemoryDelta> {
        serde_json::from_slice(delta).map_err(|e| SyncError::Vcs(format!("bad delta: {e}")))
    }
}

impl VersionControl for MemoryRepository {
    fn head_commit(&self, _branch: &str) -> SyncResult<Option<CommitId>> {
        Ok(self.head())
    }

    fn create_delta(&self, _branch: &str, baseline: Option<&CommitId>) -> SyncResult<Vec<u8>> {
        let inner = self.inner.read();
        let head = inner
            .head
            .clone()
            .ok_or_else(|| SyncError::Vcs("branch has no commits".into()))?;

        let mut commits = inner.lineage(Some(&head));
        if let Some(baseline) = baseline {
            let at = commits
                .iter()
                .position(|c| &c.id == baseline)
                .ok_or_else(|| SyncError::Vcs(format!("baseline {baseline} not in history")))?;
            commits = commits.split_off(at + 1);
        }
        if commits.is_empty() {
            return Err(SyncError::Vcs("refusing to create an empty delta".into()));
        }

        let delta = MemoryDelta {
            baseline: baseline.cloned(),
            head,
            commits,
        };
        serde_json::to_vec(&delta).map_err(|e| SyncError::Vcs(e.to_string()))
    }

    fn apply_delta(&self, delta: &[u8]) -> SyncResult<CommitId> {
        let delta = Self::decode(delta)?;
        let mut inner = self.inner.write();
        if let Some(baseline) = &delta.baseline {
            if !inner.commits.contains_key(baseline) {
                return Err(SyncError::Vcs(format!(
                    "delta requires missing commit {baseline}"
                )));
            }
        }
        for commit in delta.commits {
            inner.commits.insert(commit.id.clone(), commit);
        }
        inner.frontier = Some(delta.head.clone());
        Ok(delta.head)
    }

    fn delta_head_commit(&self, delta: &[u8]) -> SyncResult<CommitId> {
        Ok(Self::decode(delta)?.head)
    }

    fn delta_baseline_requirement(&self, delta: &[u8]) -> SyncResult<Option<CommitId>> {
        Ok(Self::decode(delta)?.baseline)
    }

    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> SyncResult<bool> {
        Ok(self.inner.read().is_ancestor(ancestor, descendant))
    }

    fn replay_onto(&self, _branch: &str, frontier: &CommitId) -> SyncResult<()> {
        let mut inner = self.inner.write();
        if inner.fail_integration {
            return Err(SyncError::Integration("replay stopped on a conflict".into()));
        }
        if !inner.commits.contains_key(frontier) {
            return Err(SyncError::Integration(format!("unknown frontier {frontier}")));
        }

        // Local-only commits: everything on the branch not reachable from frontier.
        let local_only: Vec<MemoryCommit> = inner
            .lineage(inner.head.as_ref())
            .into_iter()
            .filter(|c| !inner.is_ancestor(&c.id, frontier))
            .collect();

        let mut tip = frontier.clone();
        for commit in local_only {
            let replayed = MemoryCommit::new(Some(tip), &commit.message)?;
            tip = replayed.id.clone();
            inner.commits.insert(replayed.id.clone(), replayed);
        }
        inner.head = Some(tip);
        Ok(())
    }

    fn fast_forward_onto(&self, _branch: &str, frontier: &CommitId) -> SyncResult<()> {
        let mut inner = self.inner.write();
        if inner.fail_integration {
            return Err(SyncError::Integration("fast-forward refused".into()));
        }
        if let Some(head) = &inner.head {
            if !inner.is_ancestor(head, frontier) {
                return Err(SyncError::Integration(format!(
                    "{} is not an ancestor of {}",
                    head.short(),
                    frontier.short()
                )));
            }
        }
        inner.head = Some(frontier.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_form_linear_history() {
        let repo = MemoryRepository::new();
        assert_eq!(repo.head(), None);
        let a = repo.commit("a").unwrap();
        let b = repo.commit("b").unwrap();
        assert_eq!(repo.history(), vec!["a", "b"]);
        assert!(repo.is_ancestor(&a, &b).unwrap());
        assert!(repo.is_ancestor(&b, &b).unwrap());
        assert!(!repo.is_ancestor(&b, &a).unwrap());
    }

    #[test]
    fn delta_moves_commits_between_repositories() {
        let source = MemoryRepository::new();
        let a = source.commit("a").unwrap();
        let b = source.commit("b").unwrap();

        let delta = source.create_delta("master", None).unwrap();
        assert_eq!(source.delta_head_commit(&delta).unwrap(), b);
        assert_eq!(source.delta_baseline_requirement(&delta).unwrap(), None);

        let target = MemoryRepository::new();
        assert_eq!(target.frontier(), None);
        assert_eq!(target.apply_delta(&delta).unwrap(), b);
        assert_eq!(target.head(), None);
        assert_eq!(target.frontier(), Some(b.clone()));
        assert!(target.contains(&a));
        assert!(target.contains(&b));

        target.fast_forward_onto("master", &b).unwrap();
        assert_eq!(target.history(), vec!["a", "b"]);
    }

    #[test]
    fn incremental_delta_requires_baseline() {
        let source = MemoryRepository::new();
        let a = source.commit("a").unwrap();
        source.commit("b").unwrap();
        let delta = source.create_delta("master", Some(&a)).unwrap();
        assert_eq!(source.delta_baseline_requirement(&delta).unwrap(), Some(a));

        let target = MemoryRepository::new();
        assert!(matches!(target.apply_delta(&delta), Err(SyncError::Vcs(_))));
    }

    #[test]
    fn empty_delta_refused() {
        let repo = MemoryRepository::new();
        assert!(repo.create_delta("master", None).is_err());
        let a = repo.commit("a").unwrap();
        assert!(repo.create_delta("master", Some(&a)).is_err());
    }

    #[test]
    fn replay_puts_local_commits_on_top() {
        let remote = MemoryRepository::new();
        let base = remote.commit("base").unwrap();
        let local = MemoryRepository::new();
        local
            .apply_delta(&remote.create_delta("master", None).unwrap())
            .unwrap();
        local.fast_forward_onto("master", &base).unwrap();

        remote.commit("remote 1").unwrap();
        local.commit("local 1").unwrap();
        local.commit("local 2").unwrap();

        let frontier = local
            .apply_delta(&remote.create_delta("master", Some(&base)).unwrap())
            .unwrap();
        local.replay_onto("master", &frontier).unwrap();

        assert_eq!(local.history(), vec!["base", "remote 1", "local 1", "local 2"]);
        assert!(local.is_ancestor(&frontier, &local.head().unwrap()).unwrap());
    }

    #[test]
    fn fast_forward_refuses_divergence() {
        let a = MemoryRepository::new();
        a.commit("x").unwrap();
        let b = MemoryRepository::new();
        let y = b.commit("y").unwrap();
        a.apply_delta(&b.create_delta("master", None).unwrap()).unwrap();
        assert!(matches!(
            a.fast_forward_onto("master", &y),
            Err(SyncError::Integration(_))
        ));
    }
}
