use serde::Serialize;

use crate::ParseError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageEntry {
    pub name: String,
    pub version: String,
}

impl PackageEntry {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let name = fields.next()?;
        let version = fields.next()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self::new(name, version))
    }

    pub fn to_line(&self) -> String {
        format!("{} {}", self.name, self.version)
    }
}

/// A name-sorted package listing holding at most one entry per name.
///
/// When the input lists a name more than once (one line per architecture is
/// the common case) the first entry seen wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<PackageEntry>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = PackageEntry>,
    {
        let mut entries = entries.into_iter().collect::<Vec<_>>();
        // sort_by is stable, so equal names keep their input order for dedup_by.
        entries.sort_by(|left, right| left.name.cmp(&right.name));
        entries.dedup_by(|later, earlier| later.name == earlier.name);
        Self { entries }
    }

    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let mut entries = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry = PackageEntry::parse_line(line).ok_or_else(|| ParseError::MalformedEntry {
                line_no: index + 1,
                line: line.to_string(),
            })?;
            entries.push(entry);
        }
        Ok(Self::from_entries(entries))
    }

    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .binary_search_by(|entry| entry.name.as_str().cmp(name))
            .ok()
            .map(|index| self.entries[index].version.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_line());
            out.push('\n');
        }
        out
    }
}

impl FromIterator<PackageEntry> for Snapshot {
    fn from_iter<T: IntoIterator<Item = PackageEntry>>(iter: T) -> Self {
        Self::from_entries(iter)
    }
}
