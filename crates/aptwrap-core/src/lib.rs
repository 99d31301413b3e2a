mod change;
mod error;
mod package;
mod parse;
mod version;

pub use change::{parse_change_log, Change, ChangeEvent, ChangeKind, TIMESTAMP_FORMAT};
pub use error::ParseError;
pub use package::{PackageEntry, Snapshot};
pub use parse::{parse_dpkg_query, parse_dumpavail};
pub use version::compare_dotted;
