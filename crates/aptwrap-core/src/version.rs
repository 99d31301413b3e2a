use std::cmp::Ordering;

/// Orders two version strings by splitting both on `.` and comparing the
/// pieces pairwise as plain strings.
///
/// This is not Debian version ordering. Epochs, tildes and numeric runs are
/// not understood, so `10.0` sorts below `9.0`.
pub fn compare_dotted(left: &str, right: &str) -> Ordering {
    left.split('.').cmp(right.split('.'))
}
