use crate::PackageEntry;

/// Extracts `Package`/`Version` pairs from `apt-cache dumpavail` style
/// stanzas. Stanzas missing either field are skipped.
pub fn parse_dumpavail(raw: &str) -> Vec<PackageEntry> {
    let mut entries = Vec::new();
    let mut name: Option<&str> = None;
    let mut version: Option<&str> = None;

    for line in raw.lines() {
        if line.trim().is_empty() {
            if let (Some(name), Some(version)) = (name.take(), version.take()) {
                entries.push(PackageEntry::new(name, version));
            }
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }

        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match field {
            "Package" => name = Some(value),
            "Version" => version = Some(value),
            _ => {}
        }
    }

    if let (Some(name), Some(version)) = (name, version) {
        entries.push(PackageEntry::new(name, version));
    }

    entries
}

/// Parses `dpkg-query --show` rows of the form
/// `<package>\t<version>\t<status-abbrev>` and keeps installed packages only.
///
/// The second character of the status abbreviation is the current package
/// state; `i` means installed.
pub fn parse_dpkg_query(raw: &str) -> Vec<PackageEntry> {
    raw.lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let name = fields.next()?.trim();
            let version = fields.next()?.trim();
            let status = fields.next()?;
            if name.is_empty() || version.is_empty() {
                return None;
            }
            if status.chars().nth(1) != Some('i') {
                return None;
            }
            Some(PackageEntry::new(name, version))
        })
        .collect()
}
