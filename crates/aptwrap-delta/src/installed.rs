use std::cmp::Ordering;

use aptwrap_core::{compare_dotted, Change, ChangeKind, PackageEntry, Snapshot};

/// Merge-walks two installed-package captures and reports every name whose
/// presence or version differs, in name order.
pub fn diff_installed(before: &Snapshot, after: &Snapshot) -> Vec<Change> {
    let before = before.entries();
    let after = after.entries();
    let mut changes = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < before.len() && j < after.len() {
        match before[i].name.cmp(&after[j].name) {
            Ordering::Less => {
                changes.push(removed(&before[i]));
                i += 1;
            }
            Ordering::Greater => {
                changes.push(installed(&after[j]));
                j += 1;
            }
            Ordering::Equal => {
                if before[i].version != after[j].version {
                    changes.push(version_change(&before[i].version, &after[j]));
                }
                i += 1;
                j += 1;
            }
        }
    }

    // At most one side has entries left.
    changes.extend(before[i..].iter().map(removed));
    changes.extend(after[j..].iter().map(installed));
    changes
}

fn removed(entry: &PackageEntry) -> Change {
    Change::new(ChangeKind::Remove, &entry.name, &entry.version)
}

fn installed(entry: &PackageEntry) -> Change {
    Change::new(ChangeKind::Install, &entry.name, &entry.version)
}

fn version_change(before_version: &str, after: &PackageEntry) -> Change {
    let kind = match compare_dotted(&after.version, before_version) {
        Ordering::Greater => ChangeKind::Upgrade,
        _ => ChangeKind::Downgrade,
    };
    Change::new(kind, &after.name, &after.version)
}
