//! Single-writer lock for `fi track`.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

/// Exclusive lock held for the lifetime of a tracking run.
///
/// The lock file sits next to the database; the OS releases the lock when
/// the file is closed, including on crash.
#[derive(Debug)]
pub struct TrackLock {
    file: File,
    path: PathBuf,
}

impl TrackLock {
    /// Takes the lock without blocking.
    pub fn acquire(database_path: &Path) -> Result<Self> {
        let path = database_path.with_extension("lock");
        let file = File::create(&path)
            .with_context(|| format!("failed to create lock file {}", path.display()))?;
        file.try_lock_exclusive().with_context(|| {
            format!(
                "another `fi track` is already writing to {}",
                database_path.display()
            )
        })?;
        tracing::debug!(path = %path.display(), "acquired track lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TrackLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to release track lock");
        }
    }
}
