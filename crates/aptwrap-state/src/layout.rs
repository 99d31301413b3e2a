use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{StateConfig, StateError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    host_dir: PathBuf,
}

impl HostLayout {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            host_dir: config.root().join(config.host()),
        }
    }

    pub fn host_dir(&self) -> &Path {
        &self.host_dir
    }

    pub fn available_path(&self) -> PathBuf {
        self.host_dir.join("Available")
    }

    pub fn previous_available_path(&self) -> PathBuf {
        self.host_dir.join("Available.prv")
    }

    pub fn new_packages_path(&self) -> PathBuf {
        self.host_dir.join("New")
    }

    pub fn change_log_path(&self) -> PathBuf {
        self.host_dir.join("Log")
    }

    pub fn pre_image_path(&self) -> PathBuf {
        self.host_dir.join("Installed.before")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.host_dir.join("lock")
    }

    pub fn staging_path(path: &Path) -> PathBuf {
        let mut staged = OsString::from(path.as_os_str());
        staged.push(".tmp");
        PathBuf::from(staged)
    }

    pub fn ensure_host_dir(&self) -> Result<(), StateError> {
        fs::create_dir_all(&self.host_dir).map_err(|source| StateError::StateDir {
            path: self.host_dir.clone(),
            source,
        })
    }
}
