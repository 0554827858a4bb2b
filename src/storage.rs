//! Staging area for recorded and synthesized audio
//!
//! Audio is written to a named blob before it is uploaded or played and
//! removed once the turn is over.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Named byte blobs
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name`, replacing any previous content
    ///
    /// # Errors
    ///
    /// Returns error if the blob cannot be written
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Read a previously written blob
    ///
    /// # Errors
    ///
    /// Returns error if the blob is missing or unreadable
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Delete a blob; deleting a missing blob succeeds
    ///
    /// # Errors
    ///
    /// Returns error if the blob exists but cannot be deleted
    fn remove(&self, name: &str) -> Result<()>;
}

/// Blob store backed by a directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open (and create if needed) a store rooted at `root`
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            Error::Storage(format!("cannot create {}: {e}", root.display()))
        })?;

        tracing::debug!(path = %root.display(), "blob store opened");
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(Error::Storage(format!("invalid blob name: {name:?}")));
        }
        Ok(self.root.join(name))
    }
}

impl BlobStore for FsBlobStore {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;

        // Write beside the target and rename so readers never see a partial blob
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| Error::Storage(format!("cannot stage {name}: {e}")))?;
        tmp.write_all(bytes)
            .and_then(|()| tmp.flush())
            .map_err(|e| Error::Storage(format!("cannot write {name}: {e}")))?;
        tmp.persist(&path)
            .map_err(|e| Error::Storage(format!("cannot persist {name}: {e}")))?;

        tracing::trace!(name, bytes = bytes.len(), "blob written");
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        std::fs::read(&path).map_err(|e| Error::Storage(format!("cannot read {name}: {e}")))
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("cannot remove {name}: {e}"))),
        }
    }
}
