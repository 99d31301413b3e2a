use std::path::{Path, PathBuf};

use aptwrap_core::{parse_change_log, ChangeEvent, Snapshot};
use aptwrap_delta::diff_installed;
use chrono::{Local, NaiveDateTime, Timelike};
use tracing::{info, warn};

use crate::fs_utils::{
    append_lines, read_optional, read_snapshot, remove_file_if_exists, write_atomic,
};
use crate::{HostLayout, PackageIndex, StateConfig, StateError, StateLock, INSTALLED_QUERY};

/// Records install/remove/upgrade/downgrade events by comparing the
/// installed packages before and after a mutating package operation.
pub struct ChangeLogger<'a> {
    layout: HostLayout,
    index: &'a dyn PackageIndex,
}

/// An open bracket around one mutating operation. Holds the state lock and
/// the pre-image file; both are released when the bracket is finished or
/// dropped.
#[derive(Debug)]
pub struct LogBracket {
    pre_image: PathBuf,
    _lock: StateLock,
}

impl LogBracket {
    pub fn pre_image_path(&self) -> &Path {
        &self.pre_image
    }
}

impl Drop for LogBracket {
    fn drop(&mut self) {
        if let Err(err) = remove_file_if_exists(&self.pre_image) {
            warn!(
                pre_image = %self.pre_image.display(),
                error = %err,
                "failed to remove change-log pre-image"
            );
        }
    }
}

impl<'a> ChangeLogger<'a> {
    pub fn new(config: &StateConfig, index: &'a dyn PackageIndex) -> Self {
        Self {
            layout: HostLayout::new(config),
            index,
        }
    }

    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    pub fn start_log(&self) -> Result<LogBracket, StateError> {
        self.layout.ensure_host_dir()?;
        let pre_image = self.layout.pre_image_path();

        let lock = match StateLock::acquire(&self.layout) {
            Ok(lock) => lock,
            Err(StateError::Locked { path }) => {
                if pre_image.exists() {
                    return Err(StateError::BracketPending { path: pre_image });
                }
                return Err(StateError::Locked { path });
            }
            Err(err) => return Err(err),
        };

        if pre_image.exists() {
            warn!(
                pre_image = %pre_image.display(),
                "replacing pre-image left behind by an interrupted operation"
            );
            remove_file_if_exists(&pre_image)
                .map_err(StateError::io("failed to remove stale pre-image", &pre_image))?;
        }

        let before = self.capture_installed()?;
        write_atomic(&pre_image, before.to_text().as_bytes())?;
        info!(installed = before.len(), "captured installed packages");

        Ok(LogBracket {
            pre_image,
            _lock: lock,
        })
    }

    pub fn finish_log(&self, bracket: LogBracket) -> Result<Vec<ChangeEvent>, StateError> {
        let result = self.record_changes(&bracket);
        drop(bracket);
        result
    }

    pub fn has_pending_bracket(&self) -> bool {
        self.layout.pre_image_path().exists()
    }

    pub fn read_log(&self) -> Result<Vec<ChangeEvent>, StateError> {
        let path = self.layout.change_log_path();
        match read_optional(&path)? {
            Some(raw) => parse_change_log(&raw).map_err(|err| StateError::malformed_log(&path, err)),
            None => Ok(Vec::new()),
        }
    }

    fn record_changes(&self, bracket: &LogBracket) -> Result<Vec<ChangeEvent>, StateError> {
        let before = read_snapshot(&bracket.pre_image)?;
        let after = self.capture_installed()?;

        let timestamp = now_to_the_second();
        let events = diff_installed(&before, &after)
            .into_iter()
            .map(|change| ChangeEvent::new(timestamp, change))
            .collect::<Vec<_>>();

        let lines = events.iter().map(ChangeEvent::to_line).collect::<Vec<_>>();
        append_lines(&self.layout.change_log_path(), &lines)?;
        info!(events = events.len(), "recorded package changes");
        Ok(events)
    }

    fn capture_installed(&self) -> Result<Snapshot, StateError> {
        let entries = self
            .index
            .installed_packages()
            .map_err(|err| StateError::IndexQuery {
                query: INSTALLED_QUERY,
                message: format!("{err:#}"),
            })?;
        if entries.is_empty() {
            return Err(StateError::EmptyIndex {
                query: INSTALLED_QUERY,
            });
        }
        Ok(Snapshot::from_entries(entries))
    }
}

fn now_to_the_second() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
