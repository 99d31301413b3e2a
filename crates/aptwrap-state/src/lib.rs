mod config;
mod error;
mod fs_utils;
mod index;
mod layout;
mod lock;
mod logger;
mod store;

pub use config::StateConfig;
pub use error::StateError;
pub use index::{PackageIndex, AVAILABLE_QUERY, INSTALLED_QUERY};
pub use layout::HostLayout;
pub use lock::StateLock;
pub use logger::{ChangeLogger, LogBracket};
pub use store::{RefreshReport, SnapshotStore, SnapshotSummary, StoreSummary};
