//! Backblaze B2 store driven through the `backblaze-b2` command-line tool.
//!
//! The tool must already be authorized (`backblaze-b2 authorize_account`).

use crate::error::{StoreError, StoreResult};
use crate::store::{BlobStore, ListedObject};
use serde::Deserialize;
use std::process::{Command, Output};
use tracing::debug;

/// Default name of the B2 command-line client.
pub const DEFAULT_B2_PROGRAM: &str = "backblaze-b2";

/// One file version as reported by `backblaze-b2 ls --json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct B2FileVersion {
    file_name: String,
    #[serde(default)]
    file_id: String,
    #[serde(default)]
    upload_timestamp: u64,
    #[serde(default)]
    action: Option<String>,
}

/// A blob store backed by a Backblaze B2 bucket.
#[derive(Debug, Clone)]
pub struct B2CliStore {
    bucket: String,
    program: String,
}

impl B2CliStore {
    /// Creates a store for the given bucket using the default client program.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            program: DEFAULT_B2_PROGRAM.to_string(),
        }
    }

    /// Overrides the client program (useful for wrappers or tests).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn run(&self, args: &[&str]) -> StoreResult<Output> {
        debug!(program = %self.program, ?args, "running b2 client");
        let output = Command::new(&self.program).args(args).output()?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(StoreError::Command {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn versions(&self) -> StoreResult<Vec<B2FileVersion>> {
        let output = self.run(&["ls", &self.bucket, "--json"])?;
        parse_versions(&output.stdout)
    }
}

fn parse_versions(stdout: &[u8]) -> StoreResult<Vec<B2FileVersion>> {
    let versions: Vec<B2FileVersion> = serde_json::from_slice(stdout)
        .map_err(|e| StoreError::InvalidListing(e.to_string()))?;
    Ok(versions
        .into_iter()
        .filter(|v| v.action.as_deref().map_or(true, |action| action == "upload"))
        .collect())
}

fn looks_like_not_found(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("not found") || lower.contains("not_found") || lower.contains("404")
}

impl BlobStore for B2CliStore {
    fn list(&self) -> StoreResult<Vec<ListedObject>> {
        Ok(self
            .versions()?
            .into_iter()
            .map(|v| ListedObject::new(v.file_name, v.upload_timestamp))
            .collect())
    }

    fn put(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        let temp = tempfile::NamedTempFile::new()?;
        std::fs::write(temp.path(), data)?;
        let local = temp.path().to_string_lossy().into_owned();
        self.run(&["upload_file", &self.bucket, &local, name])?;
        Ok(())
    }

    fn get(&self, name: &str) -> StoreResult<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let local = dir.path().join("download");
        let local_str = local.to_string_lossy().into_owned();
        match self.run(&["download_file_by_name", &self.bucket, name, &local_str]) {
            Ok(_) => Ok(std::fs::read(&local)?),
            Err(StoreError::Command { stderr, .. }) if looks_like_not_found(&stderr) => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        for version in self.versions()?.into_iter().filter(|v| v.file_name == name) {
            self.run(&["delete_file_version", &version.file_name, &version.file_id])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"fileName": "0000000001.000001.laptop.1700000000000.final.aa.link",
         "fileId": "4_z1", "uploadTimestamp": 1700000000123, "action": "upload"},
        {"fileName": "stale", "fileId": "4_z2", "uploadTimestamp": 5, "action": "hide"},
        {"fileName": "notes/", "fileId": "", "uploadTimestamp": 0, "action": "folder"},
        {"fileName": "plain", "fileId": "4_z3", "uploadTimestamp": 7}
    ]"#;

    #[test]
    fn parse_versions_keeps_uploads_only() {
        let versions = parse_versions(SAMPLE.as_bytes()).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].upload_timestamp, 1_700_000_000_123);
        assert_eq!(versions[0].file_id, "4_z1");
        assert_eq!(versions[1].file_name, "plain");
    }

    #[test]
    fn parse_versions_rejects_garbage() {
        let err = parse_versions(b"not json").unwrap_err();
        assert!(matches!(err, StoreError::InvalidListing(_)));
    }

    #[test]
    fn not_found_detection() {
        assert!(looks_like_not_found("ERROR: File not present: not found"));
        assert!(looks_like_not_found("status 404"));
        assert!(!looks_like_not_found("unauthorized"));
    }

    #[test]
    fn missing_program_is_io_error() {
        let store = B2CliStore::new("bucket").with_program("reposync-no-such-b2-client");
        assert!(matches!(store.list(), Err(StoreError::Io(_))));
    }
}
