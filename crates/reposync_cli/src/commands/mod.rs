//! CLI command implementations.

pub mod pull;
pub mod push;
pub mod release_lease;
pub mod status;

use clap::Args;
use reposync_engine::{
    ConfigFile, DesktopNotifier, GitCli, LogNotifier, Notifier, PassphraseCipher, Severity,
    StateStore, SyncConfig, SyncEngine, SyncError, SyncResult, DEFAULT_BRANCH, DEFAULT_METADATA_DIR,
};
use reposync_storage::{BlobStore, StoreTarget};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;

/// Store used when neither a flag nor the config file names one.
pub const DEFAULT_STORE: &str = "b2:notes-1234";

/// Passphrase file name, relative to the repository root.
pub const DEFAULT_PASSPHRASE_FILE: &str = ".passphrase";

/// Settings shared by every command that talks to the store.
#[derive(Args, Debug, Clone, Default)]
pub struct Options {
    /// Store target (b2:<bucket>, dir:<path>, or a bare path)
    #[arg(long)]
    pub store: Option<String>,

    /// Branch to synchronize
    #[arg(long)]
    pub branch: Option<String>,

    /// Delta size in bytes above which a link closes its position
    #[arg(long)]
    pub target_size: Option<usize>,

    /// Passphrase file (default: <repo>/.passphrase)
    #[arg(long)]
    pub passphrase_file: Option<PathBuf>,

    /// Log notifications instead of showing them on the desktop
    #[arg(long)]
    pub no_notify: bool,
}

/// Arguments of `push` and `pull`.
#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Repository path
    pub repo: PathBuf,

    /// Name of this machine; dots are replaced by underscores
    pub instance_id: String,

    #[command(flatten)]
    pub options: Options,
}

/// A repository with its settings resolved from flags, config file and
/// defaults, in that order.
pub struct Context {
    repo: PathBuf,
    metadata_dir: PathBuf,
    file: ConfigFile,
    options: Options,
}

impl Context {
    /// Locates the repository's metadata directory and reads its config file.
    pub fn open(repo: &Path, options: &Options) -> SyncResult<Self> {
        let metadata_dir = GitCli::new(repo).git_dir()?.join(DEFAULT_METADATA_DIR);
        let file = ConfigFile::load(&ConfigFile::path_in(&metadata_dir))?.unwrap_or_default();
        Ok(Self::with_file(repo, metadata_dir, file, options))
    }

    fn with_file(repo: &Path, metadata_dir: PathBuf, file: ConfigFile, options: &Options) -> Self {
        Self {
            repo: repo.to_path_buf(),
            metadata_dir,
            file,
            options: options.clone(),
        }
    }

    /// Engine configuration for `instance_id`.
    pub fn config(&self, instance_id: &str) -> SyncConfig {
        let mut config = self.file.apply(SyncConfig::new(normalize_instance_id(instance_id)));
        if let Some(branch) = &self.options.branch {
            config = config.with_branch(branch.clone());
        }
        if let Some(size) = self.options.target_size {
            config = config.with_target_link_size(size);
        }
        config
    }

    /// The branch in effect.
    pub fn branch(&self) -> &str {
        self.options
            .branch
            .as_deref()
            .or(self.file.branch.as_deref())
            .unwrap_or(DEFAULT_BRANCH)
    }

    /// The store target string in effect.
    pub fn store_target(&self) -> &str {
        self.options
            .store
            .as_deref()
            .or(self.file.store.as_deref())
            .unwrap_or(DEFAULT_STORE)
    }

    /// Opens the store.
    pub fn store(&self) -> SyncResult<Box<dyn BlobStore>> {
        let target = StoreTarget::parse(self.store_target())
            .map_err(|e| SyncError::Config(e.to_string()))?;
        Ok(target.open()?)
    }

    /// Passphrase file location; relative paths are taken from the repository.
    pub fn passphrase_path(&self) -> PathBuf {
        let configured = self
            .options
            .passphrase_file
            .clone()
            .or_else(|| self.file.passphrase_file.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PASSPHRASE_FILE));
        if configured.is_absolute() {
            configured
        } else {
            self.repo.join(configured)
        }
    }

    /// Opens the local state store.
    pub fn state(&self) -> SyncResult<StateStore> {
        StateStore::open(&self.metadata_dir)
    }

    /// Returns the notifier the settings ask for.
    pub fn notifier(&self) -> Box<dyn Notifier> {
        notifier(self.options.no_notify || self.file.notify == Some(false))
    }

    /// Builds an engine over git, the configured store and the passphrase.
    pub fn engine(&self, instance_id: &str) -> SyncResult<SyncEngine<GitCli, Box<dyn BlobStore>>> {
        SyncEngine::new(
            self.config(instance_id),
            GitCli::new(&self.repo),
            self.store()?,
            PassphraseCipher::from_file(&self.passphrase_path())?,
            self.state()?,
        )
    }
}

/// Hostnames often carry dots, which link names reserve as separators.
pub fn normalize_instance_id(raw: &str) -> String {
    raw.replace('.', "_")
}

/// Desktop notifications unless `quiet`.
pub fn notifier(quiet: bool) -> Box<dyn Notifier> {
    if quiet {
        Box::new(LogNotifier)
    } else {
        Box::new(DesktopNotifier::new())
    }
}

/// Turns a command result into an exit code, raising a critical
/// notification on failure.
pub fn report(failure: &str, notifier: &dyn Notifier, result: SyncResult<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "{failure}");
            notifier.notify(&format!("{failure}:\n\n{e}"), Severity::Critical);
            ExitCode::FAILURE
        }
    }
}
