use aptwrap_core::PackageEntry;

pub const AVAILABLE_QUERY: &str = "available";
pub const INSTALLED_QUERY: &str = "installed";

/// Source of live package listings, normally apt and dpkg.
///
/// Entries may arrive unsorted and may repeat a name once per architecture.
pub trait PackageIndex {
    fn available_packages(&self) -> anyhow::Result<Vec<PackageEntry>>;

    fn installed_packages(&self) -> anyhow::Result<Vec<PackageEntry>>;
}
