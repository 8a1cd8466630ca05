//! Local sync state and the operation lease.
//!
//! Both live in a private metadata directory inside the repository's git
//! directory:
//!
//! ```text
//! <repo>/.git/reposync/
//! ├─ state.json       # LocalSyncState
//! ├─ lease.json       # present only while push/pull runs (or after a crash)
//! └─ config.json      # optional ConfigFile
//! ```
//!
//! Nothing in here is ever shared with other instances.

use crate::error::{SyncError, SyncResult};
use fs2::FileExt;
use reposync_protocol::{CommitId, LinkId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const STATE_FILE: &str = "state.json";
const STATE_TEMP: &str = "state.json.tmp";
const LEASE_FILE: &str = "lease.json";

/// Progress of the local instance along the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSyncState {
    /// Last link pushed or applied.
    pub last_link: Option<LinkId>,
    /// Head commit carried by that link.
    pub last_included: Option<CommitId>,
    /// Baseline that link's delta was built against.
    pub last_required: Option<CommitId>,
}

impl LocalSyncState {
    /// Creates a state recording one link.
    pub fn new(link: LinkId, included: CommitId, required: Option<CommitId>) -> Self {
        Self {
            last_link: Some(link),
            last_included: Some(included),
            last_required: required,
        }
    }

    /// Position of the recorded link, if any.
    #[must_use]
    pub fn position(&self) -> Option<(u64, u32)> {
        self.last_link.as_ref().map(LinkId::position)
    }
}

/// Which operation holds a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseOperation {
    /// A push is running.
    Push,
    /// A pull is running.
    Pull,
}

impl fmt::Display for LeaseOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaseOperation::Push => f.write_str("push"),
            LeaseOperation::Pull => f.write_str("pull"),
        }
    }
}

/// Record written while an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Instance that took the lease.
    pub owner: String,
    /// Operation that took it.
    pub operation: LeaseOperation,
    /// Process id of the holder.
    pub pid: u32,
    /// Unix milliseconds when it was taken.
    pub acquired_at_ms: u64,
}

/// Removes the lease file when dropped.
#[derive(Debug)]
pub struct LeaseGuard {
    path: PathBuf,
    file: Option<File>,
}

impl LeaseGuard {
    fn record(&self, lease: &Lease) -> SyncResult<()> {
        let Some(mut file) = self.file.as_ref() else {
            return Err(SyncError::State("lease file already released".into()));
        };
        file.try_lock_exclusive()?;
        let data = serde_json::to_vec(lease).map_err(|e| SyncError::State(e.to_string()))?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release lease");
        }
    }
}

/// Reads and writes [`LocalSyncState`] and manages the lease.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Opens (creating if needed) the metadata directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> SyncResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the metadata directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    fn lease_path(&self) -> PathBuf {
        self.dir.join(LEASE_FILE)
    }

    /// Reads the state, returning `None` before the first sync.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] if the file exists but cannot be parsed.
    pub fn read(&self) -> SyncResult<Option<LocalSyncState>> {
        let path = self.state_path();
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| SyncError::State(format!("{}: {e}", path.display())))
    }

    /// Writes the state atomically.
    ///
    /// Write to a temporary file, fsync it, rename over the old state and
    /// fsync the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub fn write(&self, state: &LocalSyncState) -> SyncResult<()> {
        let data =
            serde_json::to_vec_pretty(state).map_err(|e| SyncError::State(e.to_string()))?;
        let temp_path = self.dir.join(STATE_TEMP);

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.state_path())?;
        self.sync_directory()?;

        debug!(position = ?state.position(), "local sync state written");
        Ok(())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> SyncResult<()> {
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> SyncResult<()> {
        Ok(())
    }

    /// Takes the lease for one operation.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LeaseHeld`] if a lease file already exists, which
    /// means another operation is running or a previous one was interrupted.
    pub fn acquire_lease(&self, owner: &str, operation: LeaseOperation) -> SyncResult<LeaseGuard> {
        let path = self.lease_path();
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(self.held_error());
            }
            Err(e) => return Err(e.into()),
        };

        // The guard owns the file from here on and removes it on any error.
        let guard = LeaseGuard {
            path,
            file: Some(file),
        };
        let lease = Lease {
            owner: owner.to_string(),
            operation,
            pid: std::process::id(),
            acquired_at_ms: now_ms(),
        };
        guard.record(&lease)?;

        debug!(owner, %operation, "lease acquired");
        Ok(guard)
    }

    /// Reads the current lease, if any.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read.
    pub fn read_lease(&self) -> SyncResult<Option<Lease>> {
        match fs::read(self.lease_path()) {
            Ok(data) => Ok(serde_json::from_slice(&data).ok()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns true if a lease file exists (even an unreadable one).
    #[must_use]
    pub fn lease_exists(&self) -> bool {
        self.lease_path().exists()
    }

    /// Removes a leftover lease. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be removed.
    pub fn release_lease(&self) -> SyncResult<bool> {
        match fs::remove_file(self.lease_path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn held_error(&self) -> SyncError {
        match self.read_lease() {
            Ok(Some(lease)) => SyncError::LeaseHeld {
                owner: lease.owner,
                operation: lease.operation.to_string(),
                acquired_at_ms: lease.acquired_at_ms,
            },
            _ => SyncError::LeaseHeld {
                owner: "unknown".into(),
                operation: "unknown".into(),
                acquired_at_ms: 0,
            },
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
