//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default size above which a delta closes its chain position (256 KiB).
pub const DEFAULT_TARGET_LINK_SIZE: usize = 256 * 1024;

/// Default branch that is synchronized.
pub const DEFAULT_BRANCH: &str = "master";

/// Default directory name under the repository's git directory.
pub const DEFAULT_METADATA_DIR: &str = "reposync";

/// Name of the optional per-repository configuration file.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Configuration for sync operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Instance (device) identifier written into link names.
    pub instance_id: String,
    /// Branch to synchronize.
    pub branch: String,
    /// A delta strictly larger than this closes its position.
    pub target_link_size: usize,
    /// Directory name for local sync metadata.
    pub metadata_dir: String,
}

impl SyncConfig {
    /// Creates a configuration with defaults.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            branch: DEFAULT_BRANCH.to_string(),
            target_link_size: DEFAULT_TARGET_LINK_SIZE,
            metadata_dir: DEFAULT_METADATA_DIR.to_string(),
        }
    }

    /// Sets the branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Sets the target link size.
    pub fn with_target_link_size(mut self, size: usize) -> Self {
        self.target_link_size = size;
        self
    }

    /// Sets the metadata directory name.
    pub fn with_metadata_dir(mut self, dir: impl Into<String>) -> Self {
        self.metadata_dir = dir.into();
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] for an invalid instance id, an empty
    /// branch or a zero target size.
    pub fn validate(&self) -> SyncResult<()> {
        validate_instance_id(&self.instance_id)?;
        if self.branch.trim().is_empty() {
            return Err(SyncError::Config("branch must not be empty".into()));
        }
        if self.target_link_size == 0 {
            return Err(SyncError::Config("target link size must be positive".into()));
        }
        if self.metadata_dir.is_empty() || self.metadata_dir.contains(['/', '\\']) {
            return Err(SyncError::Config(format!(
                "metadata dir {:?} must be a plain directory name",
                self.metadata_dir
            )));
        }
        Ok(())
    }
}

/// Checks that an instance id matches `[A-Za-z0-9_]+`.
///
/// # Errors
///
/// Returns [`SyncError::Config`] otherwise.
pub fn validate_instance_id(instance_id: &str) -> SyncResult<()> {
    if instance_id.is_empty()
        || !instance_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(SyncError::Config(format!(
            "instance id {instance_id:?} must match [A-Za-z0-9_]+"
        )));
    }
    Ok(())
}

/// Optional per-repository settings file.
///
/// Every field is optional; command-line flags override what is set here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Store target (`b2:<bucket>`, `dir:<path>`, ...).
    pub store: Option<String>,
    /// Branch to synchronize.
    pub branch: Option<String>,
    /// Target link size in bytes.
    pub target_link_size: Option<usize>,
    /// Path of the passphrase file, relative to the repository root.
    pub passphrase_file: Option<PathBuf>,
    /// Whether to send desktop notifications.
    pub notify: Option<bool>,
}

impl ConfigFile {
    /// Returns the file location inside a metadata directory.
    #[must_use]
    pub fn path_in(metadata_dir: &Path) -> PathBuf {
        metadata_dir.join(CONFIG_FILE_NAME)
    }

    /// Loads the file, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the file is not valid JSON for this
    /// schema.
    pub fn load(path: &Path) -> SyncResult<Option<Self>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))
    }

    /// Applies the file's engine settings on top of `config`.
    #[must_use]
    pub fn apply(&self, mut config: SyncConfig) -> SyncConfig {
        if let Some(branch) = &self.branch {
            config.branch = branch.clone();
        }
        if let Some(size) = self.target_link_size {
            config.target_link_size = size;
        }
        config
    }
}
