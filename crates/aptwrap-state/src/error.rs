use std::io;
use std::path::{Path, PathBuf};

use aptwrap_core::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to create state directory {}", path.display())]
    StateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid host id '{host}': {reason}")]
    InvalidHost { host: String, reason: &'static str },

    #[error("{query} package query failed: {message}")]
    IndexQuery { query: &'static str, message: String },

    #[error("{query} package query returned no packages; existing state left untouched")]
    EmptyIndex { query: &'static str },

    #[error("package state is locked by another invocation (lock={})", path.display())]
    Locked { path: PathBuf },

    #[error("a change-log bracket is already pending (pre-image={})", path.display())]
    BracketPending { path: PathBuf },

    #[error("malformed snapshot {} at line {line_no}: '{line}'", path.display())]
    MalformedSnapshot {
        path: PathBuf,
        line_no: usize,
        line: String,
    },

    #[error("malformed change log {} at line {line_no}: '{line}'", path.display())]
    MalformedLog {
        path: PathBuf,
        line_no: usize,
        line: String,
    },

    #[error("{action}: {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StateError {
    pub(crate) fn io(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }

    pub(crate) fn malformed_snapshot(path: &Path, err: ParseError) -> Self {
        Self::MalformedSnapshot {
            path: path.to_path_buf(),
            line_no: err.line_no(),
            line: err.line().to_string(),
        }
    }

    pub(crate) fn malformed_log(path: &Path, err: ParseError) -> Self {
        Self::MalformedLog {
            path: path.to_path_buf(),
            line_no: err.line_no(),
            line: err.line().to_string(),
        }
    }
}
