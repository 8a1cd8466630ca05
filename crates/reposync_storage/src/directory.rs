//! Directory-backed blob store.

use crate::error::{StoreError, StoreResult};
use crate::store::{BlobStore, ListedObject};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// A blob store backed by a plain directory.
///
/// Each object is one file. This works with any folder that several
/// machines can see, for example a network share or a folder replicated
/// by a file-sync service.
///
/// # Durability
///
/// - `put` writes to a hidden temporary file, syncs it, then renames it
///   into place, so readers never observe a partial object
/// - The upload timestamp is the file's modification time in milliseconds,
///   which is assigned by the filesystem rather than by the writer
///
/// # Example
///
/// ```no_run
/// use reposync_storage::{BlobStore, DirectoryBlobStore};
/// use std::path::Path;
///
/// let store = DirectoryBlobStore::open(Path::new("/mnt/shared/notes")).unwrap();
/// store.put("object", b"bytes").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    /// Opens a directory store, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the path
    /// exists but is not a directory.
    pub fn open(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root)?;
        if !root.is_dir() {
            return Err(StoreError::InvalidTarget(format!(
                "not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the directory holding the objects.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> StoreResult<PathBuf> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

fn modified_millis(metadata: &fs::Metadata) -> StoreResult<u64> {
    let modified = metadata.modified()?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    Ok(u64::try_from(millis).unwrap_or(u64::MAX))
}

impl BlobStore for DirectoryBlobStore {
    fn list(&self) -> StoreResult<Vec<ListedObject>> {
        let mut listing = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            // In-flight temporary files
            if name.starts_with('.') {
                continue;
            }
            // Another writer may delete or replace the file after read_dir.
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::Io(e)),
            };
            if !metadata.is_file() {
                continue;
            }
            listing.push(ListedObject::new(name, modified_millis(&metadata)?));
        }
        listing.sort_by(|a, b| {
            a.upload_timestamp
                .cmp(&b.upload_timestamp)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(listing)
    }

    fn put(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.object_path(name)?;
        let mut temp = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(&self.root)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn get(&self, name: &str) -> StoreResult<Vec<u8>> {
        let path = self.object_path(name)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(name.to_string())
            } else {
                StoreError::Io(e)
            }
        })
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        let path = self.object_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
