use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::{HostLayout, StateError};

/// Advisory exclusive lock on the per-host `lock` file.
///
/// Acquisition never waits. The lock is released when the guard drops.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    pub fn acquire(layout: &HostLayout) -> Result<Self, StateError> {
        let path = layout.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(StateError::io("failed to open lock file", &path))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(lock = %path.display(), "acquired state lock");
                Ok(Self { file, path })
            }
            Err(err) if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(StateError::Locked { path })
            }
            Err(err) => Err(StateError::io("failed to lock state", &path)(err)),
        }
    }

    /// Reports whether another guard currently holds the lock.
    pub fn is_held(layout: &HostLayout) -> Result<bool, StateError> {
        match Self::acquire(layout) {
            Ok(_) => Ok(false),
            Err(StateError::Locked { .. }) => Ok(true),
            Err(err) => Err(err),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(lock = %self.path.display(), "released state lock");
    }
}
