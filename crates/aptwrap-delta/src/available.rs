use std::cmp::Ordering;

use aptwrap_core::{PackageEntry, Snapshot};

use crate::Upgradable;

/// Names listed in `current` but not in `previous`.
///
/// An empty `previous` means there is no baseline yet (first refresh), and
/// nothing is reported as new.
pub fn newly_available(current: &Snapshot, previous: &Snapshot) -> Vec<String> {
    if previous.is_empty() {
        return Vec::new();
    }

    let current = current.entries();
    let previous = previous.entries();
    let mut names = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < current.len() {
        if j == previous.len() {
            names.extend(current[i..].iter().map(|entry| entry.name.clone()));
            break;
        }
        match current[i].name.cmp(&previous[j].name) {
            Ordering::Less => {
                names.push(current[i].name.clone());
                i += 1;
            }
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            Ordering::Greater => j += 1,
        }
    }

    names
}

/// Installed packages whose available version is different from the
/// installed one. Any difference counts; ordering is left to apt.
pub fn upgradable(installed: &Snapshot, available: &Snapshot) -> Vec<Upgradable> {
    let installed = installed.entries();
    let available = available.entries();
    let mut found = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < installed.len() && j < available.len() {
        match installed[i].name.cmp(&available[j].name) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                if installed[i].version != available[j].version {
                    found.push(Upgradable {
                        name: installed[i].name.clone(),
                        installed: installed[i].version.clone(),
                        available: available[j].version.clone(),
                    });
                }
                i += 1;
                j += 1;
            }
        }
    }

    found
}

/// Installed packages whose available version changed between the previous
/// and current refresh and which are not already at the current version.
///
/// Names missing from either generation never count.
pub fn new_upgrades(
    installed: &Snapshot,
    previous: &Snapshot,
    current: &Snapshot,
) -> Vec<Upgradable> {
    let previous = previous.entries();
    let current = current.entries();
    let mut found = Vec::new();
    let mut j = 0;
    let mut k = 0;

    for entry in installed.entries() {
        let previous_version = seek(previous, &mut j, &entry.name);
        let current_version = seek(current, &mut k, &entry.name);
        let (Some(previous_version), Some(current_version)) = (previous_version, current_version)
        else {
            continue;
        };

        if previous_version != current_version && entry.version != current_version {
            found.push(Upgradable {
                name: entry.name.clone(),
                installed: entry.version.clone(),
                available: current_version.to_string(),
            });
        }
    }

    found
}

pub fn upgrade_count(installed: &Snapshot, previous: &Snapshot, current: &Snapshot) -> usize {
    new_upgrades(installed, previous, current).len()
}

// Moves `cursor` forward past names sorting before `name` and returns the
// version when the entry under the cursor matches.
fn seek<'a>(entries: &'a [PackageEntry], cursor: &mut usize, name: &str) -> Option<&'a str> {
    while *cursor < entries.len() && entries[*cursor].name.as_str() < name {
        *cursor += 1;
    }
    entries
        .get(*cursor)
        .filter(|entry| entry.name == name)
        .map(|entry| entry.version.as_str())
}
