use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use aptwrap_core::Snapshot;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::{HostLayout, StateError};

pub(crate) fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, StateError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StateError::io("failed to read state file", path)(err)),
    }
}

/// Missing files read as an empty snapshot.
pub(crate) fn read_snapshot(path: &Path) -> Result<Snapshot, StateError> {
    match read_optional(path)? {
        Some(raw) => {
            Snapshot::parse(&raw).map_err(|err| StateError::malformed_snapshot(path, err))
        }
        None => Ok(Snapshot::new()),
    }
}

/// Writes `contents` next to `path` and renames it into place. The target is
/// untouched if the staged write fails.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StateError> {
    let staged = HostLayout::staging_path(path);
    if let Err(err) = write_synced(&staged, contents) {
        let _ = remove_file_if_exists(&staged);
        return Err(StateError::io("failed to write staged state file", &staged)(err));
    }
    fs::rename(&staged, path).map_err(|err| {
        let _ = remove_file_if_exists(&staged);
        StateError::io("failed to move staged state file into place", path)(err)
    })
}

/// Rotates `current` into `previous` and renames `staged` into `current`.
///
/// A missing `current` leaves an existing `previous` alone. If the final
/// rename fails, the rotated file is moved back to `current`.
pub(crate) fn promote_staged(
    staged: &Path,
    current: &Path,
    previous: &Path,
) -> Result<(), StateError> {
    let rotated = current.exists();
    if rotated {
        if let Err(err) = fs::rename(current, previous) {
            let _ = remove_file_if_exists(staged);
            return Err(StateError::io("failed to rotate current snapshot", previous)(err));
        }
    } else if !previous.exists() {
        if let Err(err) = write_atomic(previous, b"") {
            let _ = remove_file_if_exists(staged);
            return Err(err);
        }
    }

    if let Err(err) = fs::rename(staged, current) {
        if rotated {
            if let Err(restore_err) = fs::rename(previous, current) {
                warn!(
                    snapshot = %current.display(),
                    error = %restore_err,
                    "failed to restore rotated snapshot"
                );
            }
        }
        let _ = remove_file_if_exists(staged);
        return Err(StateError::io("failed to install fresh snapshot", current)(err));
    }
    Ok(())
}

pub(crate) fn write_synced(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

pub(crate) fn append_lines(path: &Path, lines: &[String]) -> Result<(), StateError> {
    if lines.is_empty() {
        return Ok(());
    }

    let mut payload = String::new();
    for line in lines {
        payload.push_str(line);
        payload.push('\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(StateError::io("failed to open change log", path))?;
    file.write_all(payload.as_bytes())
        .map_err(StateError::io("failed to append change log", path))?;
    file.flush()
        .map_err(StateError::io("failed to flush change log", path))
}

pub(crate) fn sha256_file_hex(path: &Path) -> Result<Option<String>, StateError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(hex::encode(Sha256::digest(&bytes)))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StateError::io("failed to read state file", path)(err)),
    }
}
