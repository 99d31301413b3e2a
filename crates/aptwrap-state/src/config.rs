use std::path::{Path, PathBuf};

use crate::StateError;

/// Where per-host state lives: `<root>/<host>/`.
///
/// Built once at startup and handed to the store and logger, so tests can
/// point both at a scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateConfig {
    root: PathBuf,
    host: String,
}

impl StateConfig {
    pub fn new(root: impl Into<PathBuf>, host: impl Into<String>) -> Result<Self, StateError> {
        let host = host.into();
        validate_host(&host)?;
        Ok(Self {
            root: root.into(),
            host,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

fn validate_host(host: &str) -> Result<(), StateError> {
    let reason = if host.is_empty() {
        Some("must not be empty")
    } else if host == "." || host == ".." {
        Some("must not be a relative path component")
    } else if host.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else if host.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StateError::InvalidHost {
            host: host.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
