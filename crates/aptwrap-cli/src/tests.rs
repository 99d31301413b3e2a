use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use aptwrap_core::{Change, ChangeEvent, ChangeKind, PackageEntry, Snapshot};
use aptwrap_delta::Upgradable;
use aptwrap_core::parse_dumpavail;
use aptwrap_state::{
    ChangeLogger, HostLayout, PackageIndex, RefreshReport, SnapshotSummary, StateConfig,
    StoreSummary,
};
use chrono::NaiveDate;
use clap::error::ErrorKind;

use super::*;
use crate::apt::{decode_output, AptAction, AptGet};
use crate::completion::write_completions_script;
use crate::dispatch::{run_logged_command, CliContext};
use crate::render::{OutputStyle, TerminalRenderer};
use crate::reports::{
    filter_change_events, format_change_event_lines, format_new_package_lines,
    format_refresh_lines, format_status_lines, format_upgradable_lines, new_package_rows,
    render_json, StatusReport,
};
use crate::settings::{
    detect_hostname, load_settings, parse_settings_file, resolve_host, OutputPreference,
    SettingsFile,
};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_dir() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut path = std::env::temp_dir();
    path.push(format!(
        "aptwrap-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    std::fs::create_dir_all(&path).expect("must create test dir");
    path
}

/// Hands out one installed-package capture per query, in order.
struct QueuedIndex {
    installed: RefCell<VecDeque<Vec<PackageEntry>>>,
}

impl QueuedIndex {
    fn new(captures: &[&[(&str, &str)]]) -> Self {
        let captures = captures
            .iter()
            .map(|pairs| {
                pairs
                    .iter()
                    .map(|(name, version)| PackageEntry::new(*name, *version))
                    .collect::<Vec<_>>()
            })
            .collect::<VecDeque<_>>();
        Self {
            installed: RefCell::new(captures),
        }
    }
}

impl PackageIndex for QueuedIndex {
    fn available_packages(&self) -> anyhow::Result<Vec<PackageEntry>> {
        Ok(Vec::new())
    }

    fn installed_packages(&self) -> anyhow::Result<Vec<PackageEntry>> {
        self.installed
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no installed capture left"))
    }
}

fn test_context(root: &Path, elevation: Vec<String>) -> CliContext {
    CliContext {
        config: StateConfig::new(root, "testhost").expect("valid config"),
        settings: SettingsFile::default(),
        renderer: TerminalRenderer::from_style(OutputStyle::Plain),
        apt_get: AptGet::new(elevation, false),
    }
}

fn event(kind: ChangeKind, name: &str, version: &str, second: u32) -> ChangeEvent {
    let timestamp = NaiveDate::from_ymd_opt(2024, 5, 17)
        .and_then(|date| date.and_hms_opt(9, 30, second))
        .expect("valid timestamp");
    ChangeEvent::new(timestamp, Change::new(kind, name, version))
}

#[test]
fn cli_parses_install_with_multiple_packages() {
    let cli = Cli::try_parse_from(["aptwrap", "install", "vim", "git"]).expect("command must parse");
    match cli.command {
        Commands::Install { packages } => assert_eq!(packages, vec!["vim", "git"]),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_rejects_install_without_packages() {
    let err = Cli::try_parse_from(["aptwrap", "install"]).expect_err("packages are required");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn cli_uses_apt_style_command_names() {
    for (argv, expected) in [
        (["aptwrap", "newupgrades"], "newupgrades"),
        (["aptwrap", "toupgrade"], "toupgrade"),
        (["aptwrap", "dist-upgrade"], "dist-upgrade"),
        (["aptwrap", "listlog"], "listlog"),
    ] {
        let cli = Cli::try_parse_from(argv).expect("command must parse");
        let matched = matches!(
            (&cli.command, expected),
            (Commands::NewUpgrades { .. }, "newupgrades")
                | (Commands::ToUpgrade { .. }, "toupgrade")
                | (Commands::DistUpgrade, "dist-upgrade")
                | (Commands::ListLog { .. }, "listlog")
        );
        assert!(matched, "'{expected}' parsed as {:?}", cli.command);
    }
}

#[test]
fn cli_accepts_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "aptwrap",
        "status",
        "--json",
        "--state-root",
        "/srv/aptwrap",
        "--host",
        "buildbox",
        "-vv",
    ])
    .expect("command must parse");

    assert_eq!(cli.state_root.as_deref(), Some(Path::new("/srv/aptwrap")));
    assert_eq!(cli.host.as_deref(), Some("buildbox"));
    assert_eq!(cli.verbose, 2);
    assert!(matches!(cli.command, Commands::Status { json: true }));
}

#[test]
fn cli_parses_listlog_filters() {
    let cli = Cli::try_parse_from(["aptwrap", "listlog", "--tail", "5", "--package", "vim"])
        .expect("command must parse");
    match cli.command {
        Commands::ListLog {
            tail,
            package,
            json,
        } => {
            assert_eq!(tail, Some(5));
            assert_eq!(package.as_deref(), Some("vim"));
            assert!(!json);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn verbosity_maps_to_log_directive() {
    assert_eq!(default_log_directive(0), "warn");
    assert_eq!(default_log_directive(1), "info");
    assert_eq!(default_log_directive(2), "debug");
    assert_eq!(default_log_directive(7), "debug");
}

#[test]
fn completions_script_names_the_binary() {
    let mut script = Vec::new();
    write_completions_script(CliCompletionShell::Bash, &mut script)
        .expect("must generate completions");
    let script = String::from_utf8(script).expect("completion script is UTF-8");
    assert!(script.contains("aptwrap"));
    assert!(script.contains("newupgrades"));
}

#[test]
fn settings_file_defaults_when_fields_are_missing() {
    let settings = parse_settings_file("version = 1\n").expect("must parse");
    assert_eq!(settings, SettingsFile::default());
    assert_eq!(settings.elevation(), vec!["sudo"]);
    assert_eq!(settings.output, OutputPreference::Auto);
}

#[test]
fn settings_file_parses_all_fields() {
    let settings = parse_settings_file(
        "version = 1\nhost = \"buildbox\"\nelevate = \"doas -u root\"\noutput = \"plain\"\nassume_yes = true\n",
    )
    .expect("must parse");
    assert_eq!(settings.host.as_deref(), Some("buildbox"));
    assert_eq!(settings.elevation(), vec!["doas", "-u", "root"]);
    assert_eq!(settings.output, OutputPreference::Plain);
    assert!(settings.assume_yes);
}

#[test]
fn settings_file_empty_elevate_disables_elevation() {
    let settings = parse_settings_file("elevate = \"\"\n").expect("must parse");
    assert!(settings.elevation().is_empty());
}

#[test]
fn settings_file_rejects_unsupported_version() {
    let err = parse_settings_file("version = 2\n").expect_err("version 2 is unknown");
    assert!(
        err.to_string().contains("unsupported config version 2"),
        "unexpected error: {err}"
    );
}

#[test]
fn settings_file_rejects_unknown_keys() {
    parse_settings_file("version = 1\nhostname = \"typo\"\n").expect_err("unknown key must fail");
}

#[test]
fn load_settings_without_file_uses_defaults() {
    let root = test_dir();
    assert_eq!(
        load_settings(&root).expect("missing file is fine"),
        SettingsFile::default()
    );
    std::fs::write(root.join("config.toml"), "host = \"from-file\"\n").expect("must write");
    assert_eq!(
        load_settings(&root).expect("must load").host.as_deref(),
        Some("from-file")
    );
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn host_flag_wins_over_config_file() {
    let settings = SettingsFile {
        host: Some("from-config".to_string()),
        ..SettingsFile::default()
    };
    assert_eq!(resolve_host(Some("from-flag"), &settings), "from-flag");
    assert_eq!(resolve_host(None, &settings), "from-config");
}

#[test]
fn detect_hostname_takes_first_non_empty_source() {
    let dir = test_dir();
    let empty = dir.join("empty");
    let named = dir.join("named");
    std::fs::write(&empty, "\n").expect("must write");
    std::fs::write(&named, "buildbox\n").expect("must write");

    let missing = dir.join("missing");

    assert_eq!(
        detect_hostname(&[missing.as_path(), empty.as_path(), named.as_path()]),
        "buildbox"
    );
    assert_eq!(detect_hostname(&[missing.as_path()]), "localhost");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn apt_get_argv_prefixes_elevation_and_assume_yes() {
    let apt_get = AptGet::new(vec!["sudo".to_string()], true);
    assert_eq!(
        apt_get.argv(AptAction::Install, &["vim".to_string()]),
        vec!["sudo", "apt-get", "-y", "install", "vim"]
    );
    assert_eq!(
        apt_get.argv(AptAction::Update, &[]),
        vec!["sudo", "apt-get", "update"]
    );
}

#[test]
fn apt_get_argv_without_elevation() {
    let apt_get = AptGet::new(Vec::new(), false);
    assert_eq!(
        apt_get.argv(AptAction::DistUpgrade, &[]),
        vec!["apt-get", "dist-upgrade"]
    );
    assert!(!AptAction::Update.changes_installed());
    assert!(AptAction::Autoremove.changes_installed());
}

#[test]
fn format_refresh_lines_plain_is_unadorned() {
    let report = RefreshReport {
        available: 61_234,
        previous: 61_230,
        new_packages: 4,
    };
    assert_eq!(
        format_refresh_lines(&report, 2, OutputStyle::Plain),
        vec![
            "refreshed 61,234 available packages (previously 61,230)",
            "new packages: 4",
            "new upgrades: 2",
        ]
    );
}

#[test]
fn format_refresh_lines_rich_adds_status_badges() {
    let report = RefreshReport {
        available: 10,
        previous: 9,
        new_packages: 1,
    };
    let lines = format_refresh_lines(&report, 0, OutputStyle::Rich);
    assert!(lines[0].starts_with("[OK] "));
    assert_eq!(lines[1], "[..] new packages: 1");
}

#[test]
fn new_package_rows_carry_current_versions() {
    let current = Snapshot::from_entries(vec![
        PackageEntry::new("ripgrep", "14.1.0-1"),
        PackageEntry::new("fd-find", "9.0.0-1"),
    ]);
    let rows = new_package_rows(&["fd-find".to_string(), "ghost".to_string()], &current);
    assert_eq!(
        format_new_package_lines(&rows),
        vec!["fd-find 9.0.0-1", "ghost"]
    );
    let json = render_json(&rows).expect("must serialize");
    assert!(json.contains("\"version\": null"));
}

#[test]
fn format_upgradable_lines_show_installed_and_available() {
    let rows = vec![Upgradable {
        name: "bash".to_string(),
        installed: "5.1-2".to_string(),
        available: "5.2.15-2".to_string(),
    }];
    assert_eq!(format_upgradable_lines(&rows), vec!["bash 5.1-2 -> 5.2.15-2"]);
}

#[test]
fn format_status_lines_warns_about_pending_bracket() {
    let summary = StoreSummary {
        current: SnapshotSummary {
            entries: 3,
            fingerprint: Some("0123456789abcdef".to_string()),
        },
        previous: SnapshotSummary {
            entries: 2,
            fingerprint: None,
        },
        new_packages: 1,
        refreshed_at: None,
    };
    let report = StatusReport::new("buildbox", "/srv/aptwrap/buildbox", &summary, 1, 2, true);
    let lines = format_status_lines(&report, OutputStyle::Rich);

    assert!(lines.contains(&"available: 3 (sha256=0123456789ab)".to_string()));
    assert!(lines.contains(&"previous: 2 (sha256=-)".to_string()));
    assert!(lines.contains(&"refreshed: never".to_string()));
    assert!(lines
        .last()
        .is_some_and(|line| line.starts_with("[WARN] a change-log bracket is pending")));
}

#[test]
fn change_event_lines_use_log_format() {
    let events = vec![
        event(ChangeKind::Install, "vim", "2:9.0.1378-2", 1),
        event(ChangeKind::Remove, "nano", "7.2-1", 1),
    ];
    assert_eq!(
        format_change_event_lines(&events, OutputStyle::Plain),
        vec![
            "2024-05-17T09:30:01 install vim 2:9.0.1378-2",
            "2024-05-17T09:30:01 remove nano 7.2-1",
        ]
    );
    let rich = format_change_event_lines(&events, OutputStyle::Rich);
    assert!(rich[0].starts_with("[OK] "));
    assert!(rich[1].starts_with("[WARN] "));
}

#[test]
fn filter_change_events_applies_package_before_tail() {
    let events = vec![
        event(ChangeKind::Install, "vim", "1", 1),
        event(ChangeKind::Install, "git", "1", 2),
        event(ChangeKind::Upgrade, "vim", "2", 3),
        event(ChangeKind::Upgrade, "git", "2", 4),
        event(ChangeKind::Remove, "vim", "2", 5),
    ];

    let vim_tail = filter_change_events(events.clone(), Some(2), Some("vim"));
    assert_eq!(
        vim_tail
            .iter()
            .map(|event| event.kind())
            .collect::<Vec<_>>(),
        vec![ChangeKind::Upgrade, ChangeKind::Remove]
    );

    assert_eq!(filter_change_events(events.clone(), Some(10), None).len(), 5);
    assert_eq!(filter_change_events(events.clone(), Some(0), None).len(), 0);
    assert_eq!(filter_change_events(events, None, Some("emacs")).len(), 0);
}

#[test]
fn change_events_serialize_with_log_timestamp() {
    let json = render_json(&[event(ChangeKind::Downgrade, "bash", "5.1", 9)])
        .expect("must serialize");
    assert!(json.contains("\"timestamp\": \"2024-05-17T09:30:09\""));
    assert!(json.contains("\"kind\": \"downgrade\""));
}

#[test]
fn logged_command_records_changes_when_apt_get_fails() {
    let root = test_dir();
    // `false` stands in for the elevation prefix so apt-get never runs.
    let ctx = test_context(&root, vec!["false".to_string()]);
    let index = QueuedIndex::new(&[&[("p", "1")], &[("p", "2")]]);

    let err = run_logged_command(&ctx, &index, AptAction::Install, &["p".to_string()])
        .expect_err("failing apt-get must surface");
    assert!(
        err.to_string().starts_with("apt-get install failed"),
        "unexpected error: {err:#}"
    );

    let layout = HostLayout::new(&ctx.config);
    assert!(!layout.pre_image_path().exists());
    let events = ChangeLogger::new(&ctx.config, &index)
        .read_log()
        .expect("must read log");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), ChangeKind::Upgrade);
    assert_eq!(events[0].name(), "p");
    assert_eq!(events[0].version(), "2");

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn logged_command_succeeds_and_records_changes() {
    let root = test_dir();
    let ctx = test_context(&root, vec!["true".to_string()]);
    let index = QueuedIndex::new(&[&[("a", "1")], &[("a", "1"), ("b", "3")]]);

    run_logged_command(&ctx, &index, AptAction::Install, &["b".to_string()])
        .expect("apt-get stand-in succeeds");

    let log = std::fs::read_to_string(HostLayout::new(&ctx.config).change_log_path())
        .expect("must read log");
    assert!(log.trim_end().ends_with(" install b 3"), "unexpected log: {log}");

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn decode_output_tolerates_invalid_utf8_in_free_text_fields() {
    let mut raw = b"Package: vim\nMaintainer: Jos".to_vec();
    raw.push(0xe9);
    raw.extend_from_slice(b" Dupont\nVersion: 2:9.0.1378-2\nDescription: editor\n\n");

    let entries = parse_dumpavail(&decode_output(&raw));
    assert_eq!(entries, vec![PackageEntry::new("vim", "2:9.0.1378-2")]);
}
