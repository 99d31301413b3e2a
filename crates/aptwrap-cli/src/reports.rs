use anyhow::{Context, Result};
use aptwrap_core::{ChangeEvent, ChangeKind, Snapshot};
use aptwrap_delta::Upgradable;
use aptwrap_state::{RefreshReport, StoreSummary};
use indicatif::HumanCount;
use serde::Serialize;

use crate::render::{render_status_line, OutputStyle};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct NewPackageRow {
    pub(crate) name: String,
    pub(crate) version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct StatusReport {
    pub(crate) host: String,
    pub(crate) state_dir: String,
    pub(crate) available: usize,
    pub(crate) available_sha256: Option<String>,
    pub(crate) previous: usize,
    pub(crate) previous_sha256: Option<String>,
    pub(crate) refreshed_at: Option<String>,
    pub(crate) new_packages: usize,
    pub(crate) new_upgrades: usize,
    pub(crate) upgradable: usize,
    pub(crate) pending_bracket: bool,
}

impl StatusReport {
    pub(crate) fn new(
        host: &str,
        state_dir: &str,
        summary: &StoreSummary,
        new_upgrades: usize,
        upgradable: usize,
        pending_bracket: bool,
    ) -> Self {
        Self {
            host: host.to_string(),
            state_dir: state_dir.to_string(),
            available: summary.current.entries,
            available_sha256: summary.current.fingerprint.clone(),
            previous: summary.previous.entries,
            previous_sha256: summary.previous.fingerprint.clone(),
            refreshed_at: summary
                .refreshed_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string()),
            new_packages: summary.new_packages,
            new_upgrades,
            upgradable,
            pending_bracket,
        }
    }
}

/// Pairs each newly available name with its version in `current`.
pub(crate) fn new_package_rows(names: &[String], current: &Snapshot) -> Vec<NewPackageRow> {
    names
        .iter()
        .map(|name| NewPackageRow {
            name: name.clone(),
            version: current.get(name).map(str::to_string),
        })
        .collect()
}

pub(crate) fn format_refresh_lines(
    report: &RefreshReport,
    new_upgrades: usize,
    style: OutputStyle,
) -> Vec<String> {
    vec![
        render_status_line(
            style,
            "ok",
            &format!(
                "refreshed {} available packages (previously {})",
                HumanCount(report.available as u64),
                HumanCount(report.previous as u64)
            ),
        ),
        render_status_line(
            style,
            "info",
            &format!("new packages: {}", HumanCount(report.new_packages as u64)),
        ),
        render_status_line(
            style,
            "info",
            &format!("new upgrades: {}", HumanCount(new_upgrades as u64)),
        ),
    ]
}

pub(crate) fn format_new_package_lines(rows: &[NewPackageRow]) -> Vec<String> {
    rows.iter()
        .map(|row| match &row.version {
            Some(version) => format!("{} {version}", row.name),
            None => row.name.clone(),
        })
        .collect()
}

pub(crate) fn format_upgradable_lines(rows: &[Upgradable]) -> Vec<String> {
    rows.iter()
        .map(|row| format!("{} {} -> {}", row.name, row.installed, row.available))
        .collect()
}

pub(crate) fn format_status_lines(report: &StatusReport, style: OutputStyle) -> Vec<String> {
    let fingerprint = |value: &Option<String>| {
        value
            .as_deref()
            .map(short_fingerprint)
            .unwrap_or("-")
            .to_string()
    };

    let mut lines = vec![
        format!("host: {}", report.host),
        format!("state: {}", report.state_dir),
        format!(
            "available: {} (sha256={})",
            HumanCount(report.available as u64),
            fingerprint(&report.available_sha256)
        ),
        format!(
            "previous: {} (sha256={})",
            HumanCount(report.previous as u64),
            fingerprint(&report.previous_sha256)
        ),
        format!(
            "refreshed: {}",
            report.refreshed_at.as_deref().unwrap_or("never")
        ),
        format!("new packages: {}", report.new_packages),
        format!("new upgrades: {}", report.new_upgrades),
        format!("upgradable: {}", report.upgradable),
    ];
    if report.pending_bracket {
        lines.push(render_status_line(
            style,
            "warn",
            "a change-log bracket is pending; another apt operation may be running",
        ));
    }
    lines
}

fn short_fingerprint(value: &str) -> &str {
    value.get(..12).unwrap_or(value)
}

pub(crate) fn format_change_event_lines(events: &[ChangeEvent], style: OutputStyle) -> Vec<String> {
    events
        .iter()
        .map(|event| {
            let status = match event.kind() {
                ChangeKind::Install | ChangeKind::Upgrade => "ok",
                ChangeKind::Remove | ChangeKind::Downgrade => "warn",
            };
            render_status_line(style, status, &event.to_line())
        })
        .collect()
}

/// Keeps events for `package` (when given), then the last `tail` of them.
pub(crate) fn filter_change_events(
    events: Vec<ChangeEvent>,
    tail: Option<usize>,
    package: Option<&str>,
) -> Vec<ChangeEvent> {
    let mut events = match package {
        Some(package) => events
            .into_iter()
            .filter(|event| event.name() == package)
            .collect(),
        None => events,
    };
    if let Some(tail) = tail {
        let skip = events.len().saturating_sub(tail);
        events.drain(..skip);
    }
    events
}

pub(crate) fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize report as JSON")
}
