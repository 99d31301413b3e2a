mod available;
mod installed;
mod types;

pub use available::{new_upgrades, newly_available, upgradable, upgrade_count};
pub use installed::diff_installed;
pub use types::Upgradable;
