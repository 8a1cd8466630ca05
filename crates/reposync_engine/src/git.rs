//! Git repository driven through the `git` command-line tool.
//!
//! Deltas are git bundles. Their header is read natively so the engines can
//! check head and prerequisite commits before anything touches the
//! repository:
//!
//! ```text
//! # v2 git bundle
//! -<prerequisite oid> <subject>
//! <oid> refs/heads/master
//! <blank line>
//! <packfile>
//! ```
//!
//! Fetched bundles land in [`FRONTIER_REF`]; branches are only moved by the
//! final replay or fast-forward.

use crate::error::{SyncError, SyncResult};
use crate::vcs::VersionControl;
use reposync_protocol::CommitId;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, warn};

/// Ref that receives fetched bundle heads.
pub const FRONTIER_REF: &str = "refs/reposync/frontier";

const DEFAULT_GIT_PROGRAM: &str = "git";
const BUNDLE_V2: &str = "# v2 git bundle";
const BUNDLE_V3: &str = "# v3 git bundle";
const BUNDLE_FILE: &str = "delta.bundle";

/// Parsed header of a git bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHeader {
    /// Bundle format version (2 or 3).
    pub version: u8,
    /// Commits the bundle requires to be present.
    pub prerequisites: Vec<CommitId>,
    /// References carried by the bundle.
    pub references: Vec<(CommitId, String)>,
}

impl BundleHeader {
    /// Parses the header at the start of a bundle.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Vcs`] if the data does not start with a valid v2
    /// or v3 bundle header.
    pub fn parse(bytes: &[u8]) -> SyncResult<Self> {
        let end = bytes
            .windows(2)
            .position(|w| w == b"\n\n")
            .ok_or_else(|| SyncError::Vcs("truncated bundle header".into()))?;
        let mut lines = bytes[..end].split(|b| *b == b'\n');
        let signature = lines.next().map(header_line).transpose()?;
        let version = match signature {
            Some(BUNDLE_V2) => 2,
            Some(BUNDLE_V3) => 3,
            _ => return Err(SyncError::Vcs("not a git bundle".into())),
        };

        let mut header = Self {
            version,
            prerequisites: Vec::new(),
            references: Vec::new(),
        };
        for line in lines {
            let line = header_line(line)?;
            if line.starts_with('@') {
                if version == 2 {
                    return Err(SyncError::Vcs("capability line in a v2 bundle".into()));
                }
                continue;
            }
            if let Some(rest) = line.strip_prefix('-') {
                let oid = rest.split(' ').next().unwrap_or_default();
                header.prerequisites.push(CommitId::new(oid)?);
                continue;
            }
            let (oid, name) = line
                .split_once(' ')
                .ok_or_else(|| SyncError::Vcs(format!("bad bundle reference line {line:?}")))?;
            header.references.push((CommitId::new(oid)?, name.to_string()));
        }
        if header.references.is_empty() {
            return Err(SyncError::Vcs("bundle carries no references".into()));
        }
        Ok(header)
    }

    /// The branch reference and commit the bundle delivers.
    ///
    /// Prefers a `refs/heads/` entry, falling back to the first reference.
    #[must_use]
    pub fn head(&self) -> Option<&(CommitId, String)> {
        self.references
            .iter()
            .find(|(_, name)| name.starts_with("refs/heads/"))
            .or_else(|| self.references.first())
    }
}

fn header_line(line: &[u8]) -> SyncResult<&str> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    std::str::from_utf8(line).map_err(|_| SyncError::Vcs("bundle header is not UTF-8".into()))
}

/// A git working repository.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
    program: String,
}

impl GitCli {
    /// Creates a handle for the repository at `repo`.
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            program: DEFAULT_GIT_PROGRAM.to_string(),
        }
    }

    /// Overrides the git program.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Returns the working tree path.
    #[must_use]
    pub fn repo_path(&self) -> &Path {
        &self.repo
    }

    /// Returns the absolute git directory (usually `<repo>/.git`).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Vcs`] if `repo` is not a git repository.
    pub fn git_dir(&self) -> SyncResult<PathBuf> {
        let output = self.run(&["rev-parse", "--absolute-git-dir"])?;
        Ok(PathBuf::from(stdout_line(&output)))
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-C")
            .arg(&self.repo)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_EDITOR", "true")
            .env("LC_ALL", "C");
        command
    }

    /// Runs git and returns the output whatever the exit status.
    fn output(&self, args: &[&str]) -> SyncResult<Output> {
        debug!(repo = %self.repo.display(), ?args, "running git");
        self.command(args)
            .output()
            .map_err(|e| SyncError::Vcs(format!("cannot run {}: {e}", self.program)))
    }

    /// Runs git and fails on a non-zero exit.
    fn run(&self, args: &[&str]) -> SyncResult<Output> {
        let output = self.output(args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(SyncError::Vcs(failure(args, &output)))
        }
    }

    fn commit_exists(&self, commit: &CommitId) -> SyncResult<bool> {
        let spec = format!("{commit}^{{commit}}");
        Ok(self.output(&["cat-file", "-e", &spec])?.status.success())
    }

    fn checked_out_branch(&self) -> SyncResult<Option<String>> {
        let output = self.output(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        if output.status.success() {
            Ok(Some(stdout_line(&output).to_string()))
        } else {
            Ok(None)
        }
    }
}

fn stdout_line(output: &Output) -> &str {
    std::str::from_utf8(&output.stdout).unwrap_or_default().trim()
}

fn failure(args: &[&str], output: &Output) -> String {
    format!(
        "git {} exited with {}: {}",
        args.first().copied().unwrap_or_default(),
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )
}

impl VersionControl for GitCli {
    fn head_commit(&self, branch: &str) -> SyncResult<Option<CommitId>> {
        let spec = format!("refs/heads/{branch}^{{commit}}");
        let output = self.output(&["rev-parse", "--verify", "--quiet", &spec])?;
        if output.status.success() {
            return Ok(Some(CommitId::new(stdout_line(&output))?));
        }
        if output.status.code() == Some(1) && output.stdout.is_empty() {
            return Ok(None);
        }
        Err(SyncError::Vcs(failure(&["rev-parse"], &output)))
    }

    fn create_delta(&self, branch: &str, baseline: Option<&CommitId>) -> SyncResult<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(BUNDLE_FILE);
        let path_str = path.to_string_lossy().into_owned();
        let revs = match baseline {
            Some(baseline) => format!("{baseline}..refs/heads/{branch}"),
            None => format!("refs/heads/{branch}"),
        };
        self.run(&["bundle", "create", &path_str, &revs])?;
        Ok(fs::read(&path)?)
    }

    fn apply_delta(&self, delta: &[u8]) -> SyncResult<CommitId> {
        let header = BundleHeader::parse(delta)?;
        let (head, reference) = header
            .head()
            .cloned()
            .ok_or_else(|| SyncError::Vcs("bundle carries no references".into()))?;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join(BUNDLE_FILE);
        fs::write(&path, delta)?;
        let path_str = path.to_string_lossy().into_owned();
        let refspec = format!("+{reference}:{FRONTIER_REF}");
        self.run(&["fetch", "--no-tags", "--quiet", &path_str, &refspec])?;
        debug!(frontier = %head.short(), "bundle fetched");
        Ok(head)
    }

    fn delta_head_commit(&self, delta: &[u8]) -> SyncResult<CommitId> {
        BundleHeader::parse(delta)?
            .head()
            .map(|(commit, _)| commit.clone())
            .ok_or_else(|| SyncError::Vcs("bundle carries no references".into()))
    }

    fn delta_baseline_requirement(&self, delta: &[u8]) -> SyncResult<Option<CommitId>> {
        let header = BundleHeader::parse(delta)?;
        if header.prerequisites.len() > 1 {
            warn!(
                count = header.prerequisites.len(),
                "bundle has several prerequisites; using the first"
            );
        }
        Ok(header.prerequisites.into_iter().next())
    }

    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> SyncResult<bool> {
        if !self.commit_exists(ancestor)? || !self.commit_exists(descendant)? {
            return Ok(false);
        }
        let args = [
            "merge-base",
            "--is-ancestor",
            ancestor.as_str(),
            descendant.as_str(),
        ];
        let output = self.output(&args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(SyncError::Vcs(failure(&args, &output))),
        }
    }

    fn replay_onto(&self, branch: &str, frontier: &CommitId) -> SyncResult<()> {
        let args = ["rebase", frontier.as_str(), branch];
        let output = self.output(&args)?;
        if output.status.success() {
            return Ok(());
        }
        let reason = failure(&args, &output);
        if let Err(e) = self.run(&["rebase", "--abort"]) {
            warn!(error = %e, "rebase --abort failed");
        }
        Err(SyncError::Integration(reason))
    }

    fn fast_forward_onto(&self, branch: &str, frontier: &CommitId) -> SyncResult<()> {
        if self.checked_out_branch()?.as_deref() != Some(branch) {
            return Err(SyncError::Integration(format!(
                "branch {branch} is not checked out"
            )));
        }
        let args = ["merge", "--ff-only", "--quiet", frontier.as_str()];
        let output = self.output(&args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SyncError::Integration(failure(&args, &output)))
        }
    }
}
