//! Version-control collaborator seam.

use crate::error::SyncResult;
use reposync_protocol::CommitId;

/// The operations the engines need from a version-control system.
///
/// Deltas are opaque bytes produced and consumed only by the implementation.
/// Implementations must be usable through `&self`.
pub trait VersionControl {
    /// Returns the commit at the tip of `branch`, or `None` if it is unborn.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Vcs`] if the repository cannot be queried.
    fn head_commit(&self, branch: &str) -> SyncResult<Option<CommitId>>;

    /// Creates a delta containing everything on `branch` after `baseline`
    /// (the whole branch for `None`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Vcs`] if the delta cannot be produced.
    fn create_delta(&self, branch: &str, baseline: Option<&CommitId>) -> SyncResult<Vec<u8>>;

    /// Stores a delta's commits locally without touching any branch and
    /// returns the new frontier commit.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Vcs`] if the delta is unusable.
    fn apply_delta(&self, delta: &[u8]) -> SyncResult<CommitId>;

    /// Reads the head commit a delta carries.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Vcs`] if the delta is unreadable.
    fn delta_head_commit(&self, delta: &[u8]) -> SyncResult<CommitId>;

    /// Reads the commit a delta requires to be present, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Vcs`] if the delta is unreadable.
    fn delta_baseline_requirement(&self, delta: &[u8]) -> SyncResult<Option<CommitId>>;

    /// Returns true if `ancestor` is reachable from (or equal to) `descendant`.
    /// Commits unknown locally are not ancestors of anything.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Vcs`] if the query fails.
    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> SyncResult<bool>;

    /// Replays the commits of `branch` that are not in `frontier` on top of it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Integration`] if the replay stops; the
    /// branch is left as it was.
    fn replay_onto(&self, branch: &str, frontier: &CommitId) -> SyncResult<()>;

    /// Moves `branch` (possibly unborn) forward to `frontier`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::Integration`] if this is not a fast-forward.
    fn fast_forward_onto(&self, branch: &str, frontier: &CommitId) -> SyncResult<()>;
}

impl<V: VersionControl + ?Sized> VersionControl for &V {
    fn head_commit(&self, branch: &str) -> SyncResult<Option<CommitId>> {
        (**self).head_commit(branch)
    }

    fn create_delta(&self, branch: &str, baseline: Option<&CommitId>) -> SyncResult<Vec<u8>> {
        (**self).create_delta(branch, baseline)
    }

    fn apply_delta(&self, delta: &[u8]) -> SyncResult<CommitId> {
        (**self).apply_delta(delta)
    }

    fn delta_head_commit(&self, delta: &[u8]) -> SyncResult<CommitId> {
        (**self).delta_head_commit(delta)
    }

    fn delta_baseline_requirement(&self, delta: &[u8]) -> SyncResult<Option<CommitId>> {
        (**self).delta_baseline_requirement(delta)
    }

    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> SyncResult<bool> {
        (**self).is_ancestor(ancestor, descendant)
    }

    fn replay_onto(&self, branch: &str, frontier: &CommitId) -> SyncResult<()> {
        (**self).replay_onto(branch, frontier)
    }

    fn fast_forward_onto(&self, branch: &str, frontier: &CommitId) -> SyncResult<()> {
        (**self).fast_forward_onto(branch, frontier)
    }
}
