use std::fs;

use aptwrap_core::Snapshot;
use aptwrap_delta::newly_available;
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::fs_utils::{
    promote_staged, read_optional, read_snapshot, remove_file_if_exists, sha256_file_hex,
    write_atomic, write_synced,
};
use crate::{HostLayout, PackageIndex, StateConfig, StateError, StateLock, AVAILABLE_QUERY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub available: usize,
    pub previous: usize,
    pub new_packages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub entries: usize,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub current: SnapshotSummary,
    pub previous: SnapshotSummary,
    pub new_packages: usize,
    pub refreshed_at: Option<DateTime<Local>>,
}

/// The current and previous generations of the available-package listing
/// for one host.
///
/// Refreshing is not safe for concurrent callers without the state lock;
/// `refresh` and `reset` take it and fail fast when it is held.
pub struct SnapshotStore<'a> {
    layout: HostLayout,
    index: &'a dyn PackageIndex,
}

impl<'a> SnapshotStore<'a> {
    pub fn new(config: &StateConfig, index: &'a dyn PackageIndex) -> Self {
        Self {
            layout: HostLayout::new(config),
            index,
        }
    }

    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    /// Resets the store when no current snapshot exists yet. Returns whether
    /// a reset happened.
    pub fn ensure_initialised(&self) -> Result<bool, StateError> {
        if self.layout.available_path().exists() {
            return Ok(false);
        }
        info!(host_dir = %self.layout.host_dir().display(), "initialising package snapshots");
        self.reset()?;
        Ok(true)
    }

    pub fn reset(&self) -> Result<RefreshReport, StateError> {
        self.layout.ensure_host_dir()?;
        let _lock = StateLock::acquire(&self.layout)?;

        for path in [
            self.layout.available_path(),
            self.layout.previous_available_path(),
            self.layout.new_packages_path(),
        ] {
            remove_file_if_exists(&path)
                .map_err(StateError::io("failed to remove snapshot file", &path))?;
        }
        write_atomic(&self.layout.available_path(), b"")?;

        match self.refresh_locked() {
            Ok(report) => Ok(report),
            Err(err) => {
                // Leave no empty baseline behind so the next run retries the reset.
                let _ = remove_file_if_exists(&self.layout.available_path());
                Err(err)
            }
        }
    }

    pub fn refresh(&self) -> Result<RefreshReport, StateError> {
        self.layout.ensure_host_dir()?;
        let _lock = StateLock::acquire(&self.layout)?;
        self.refresh_locked()
    }

    fn refresh_locked(&self) -> Result<RefreshReport, StateError> {
        let entries = self
            .index
            .available_packages()
            .map_err(|err| StateError::IndexQuery {
                query: AVAILABLE_QUERY,
                message: format!("{err:#}"),
            })?;
        if entries.is_empty() {
            warn!("available package query returned nothing; keeping existing snapshots");
            return Err(StateError::EmptyIndex {
                query: AVAILABLE_QUERY,
            });
        }
        let fresh = Snapshot::from_entries(entries);

        let available_path = self.layout.available_path();
        let previous_path = self.layout.previous_available_path();
        let previous = read_snapshot(&available_path)?;

        let staged = HostLayout::staging_path(&available_path);
        if let Err(err) = write_synced(&staged, fresh.to_text().as_bytes()) {
            let _ = remove_file_if_exists(&staged);
            return Err(StateError::io("failed to write staged snapshot", &staged)(err));
        }

        promote_staged(&staged, &available_path, &previous_path)?;

        let new_names = newly_available(&fresh, &previous);
        let mut listing = new_names.join("\n");
        if !listing.is_empty() {
            listing.push('\n');
        }
        write_atomic(&self.layout.new_packages_path(), listing.as_bytes())?;

        let report = RefreshReport {
            available: fresh.len(),
            previous: previous.len(),
            new_packages: new_names.len(),
        };
        info!(
            available = report.available,
            previous = report.previous,
            new_packages = report.new_packages,
            "refreshed available package snapshot"
        );
        Ok(report)
    }

    pub fn current(&self) -> Result<Snapshot, StateError> {
        read_snapshot(&self.layout.available_path())
    }

    pub fn previous(&self) -> Result<Snapshot, StateError> {
        read_snapshot(&self.layout.previous_available_path())
    }

    pub fn new_packages(&self) -> Result<Vec<String>, StateError> {
        let path = self.layout.new_packages_path();
        let Some(raw) = read_optional(&path)? else {
            return Ok(Vec::new());
        };

        let mut names = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            let name = line.trim();
            if name.is_empty() {
                continue;
            }
            if name.contains(char::is_whitespace) {
                return Err(StateError::MalformedSnapshot {
                    path,
                    line_no: index + 1,
                    line: line.to_string(),
                });
            }
            names.push(name.to_string());
        }
        debug!(count = names.len(), "read new package names");
        Ok(names)
    }

    pub fn summary(&self) -> Result<StoreSummary, StateError> {
        let available_path = self.layout.available_path();
        let previous_path = self.layout.previous_available_path();

        let refreshed_at = fs::metadata(&available_path)
            .and_then(|metadata| metadata.modified())
            .ok()
            .map(DateTime::<Local>::from);

        Ok(StoreSummary {
            current: SnapshotSummary {
                entries: self.current()?.len(),
                fingerprint: sha256_file_hex(&available_path)?,
            },
            previous: SnapshotSummary {
                entries: self.previous()?.len(),
                fingerprint: sha256_file_hex(&previous_path)?,
            },
            new_packages: self.new_packages()?.len(),
            refreshed_at,
        })
    }
}
