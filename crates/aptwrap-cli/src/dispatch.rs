use std::path::PathBuf;

use anyhow::{Context, Result};
use aptwrap_core::Snapshot;
use aptwrap_delta::{new_upgrades, upgradable, upgrade_count};
use aptwrap_state::{ChangeLogger, PackageIndex, SnapshotStore, StateConfig, StateLock};
use tracing::{debug, info};

use crate::apt::{AptAction, AptGet, AptIndex};
use crate::completion::write_completions_script;
use crate::render::{output_style_for, TerminalRenderer};
use crate::reports::{
    filter_change_events, format_change_event_lines, format_new_package_lines,
    format_refresh_lines, format_status_lines, format_upgradable_lines, new_package_rows,
    render_json, StatusReport,
};
use crate::settings::{
    default_state_root, load_settings, resolve_host, settings_path, SettingsFile,
};
use crate::{Cli, Commands};

pub(crate) struct CliContext {
    pub(crate) config: StateConfig,
    pub(crate) settings: SettingsFile,
    pub(crate) renderer: TerminalRenderer,
    pub(crate) apt_get: AptGet,
}

impl CliContext {
    fn resolve(state_root: Option<PathBuf>, host: Option<&str>, assume_yes: bool) -> Result<Self> {
        let state_root = match state_root {
            Some(root) => root,
            None => default_state_root()?,
        };
        let settings = load_settings(&state_root)?;
        let host = resolve_host(host, &settings);
        let config = StateConfig::new(&state_root, host)
            .with_context(|| format!("failed to resolve state for {}", state_root.display()))?;
        debug!(root = %config.root().display(), host = config.host(), "resolved state config");

        let renderer = TerminalRenderer::from_style(output_style_for(settings.output));
        let apt_get = AptGet::new(settings.elevation(), assume_yes || settings.assume_yes);
        Ok(Self {
            config,
            settings,
            renderer,
            apt_get,
        })
    }
}

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            println!("aptwrap {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout();
            return write_completions_script(shell, &mut stdout);
        }
        _ => {}
    }

    let ctx = CliContext::resolve(cli.state_root, cli.host.as_deref(), cli.assume_yes)?;
    let index = AptIndex::new(ctx.renderer);

    match cli.command {
        Commands::Update => run_update_command(&ctx, &index),
        Commands::New { json } => run_new_command(&ctx, &index, json),
        Commands::NewUpgrades { json } => run_new_upgrades_command(&ctx, &index, json),
        Commands::ToUpgrade { json } => run_to_upgrade_command(&ctx, &index, json),
        Commands::Status { json } => run_status_command(&ctx, &index, json),
        Commands::Install { packages } => run_logged_command(&ctx, &index, AptAction::Install, &packages),
        Commands::Remove { packages } => run_logged_command(&ctx, &index, AptAction::Remove, &packages),
        Commands::Purge { packages } => run_logged_command(&ctx, &index, AptAction::Purge, &packages),
        Commands::Upgrade => run_logged_command(&ctx, &index, AptAction::Upgrade, &[]),
        Commands::DistUpgrade => run_logged_command(&ctx, &index, AptAction::DistUpgrade, &[]),
        Commands::Autoremove => run_logged_command(&ctx, &index, AptAction::Autoremove, &[]),
        Commands::ListLog {
            tail,
            package,
            json,
        } => run_list_log_command(&ctx, &index, tail, package.as_deref(), json),
        Commands::Reset => run_reset_command(&ctx, &index),
        Commands::Doctor => run_doctor_command(&ctx, &index),
        Commands::Version | Commands::Completions { .. } => Ok(()),
    }
}

fn run_update_command(ctx: &CliContext, index: &dyn PackageIndex) -> Result<()> {
    ctx.apt_get.run(AptAction::Update, &[])?;

    let store = SnapshotStore::new(&ctx.config, index);
    let report = if store.layout().available_path().exists() {
        store.refresh()?
    } else {
        info!("no baseline snapshot; taking one");
        store.reset()?
    };

    let installed = capture_installed(index)?;
    let upgrades = upgrade_count(&installed, &store.previous()?, &store.current()?);
    ctx.renderer
        .print_lines(&format_refresh_lines(&report, upgrades, ctx.renderer.style()));
    Ok(())
}

fn run_new_command(ctx: &CliContext, index: &dyn PackageIndex, json: bool) -> Result<()> {
    let store = initialised_store(ctx, index)?;
    let rows = new_package_rows(&store.new_packages()?, &store.current()?);

    if json {
        println!("{}", render_json(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        ctx.renderer.print_status("info", "no new packages");
        return Ok(());
    }
    ctx.renderer.print_section("new packages");
    ctx.renderer.print_lines(&format_new_package_lines(&rows));
    Ok(())
}

fn run_new_upgrades_command(ctx: &CliContext, index: &dyn PackageIndex, json: bool) -> Result<()> {
    let store = initialised_store(ctx, index)?;
    let installed = capture_installed(index)?;
    let rows = new_upgrades(&installed, &store.previous()?, &store.current()?);

    if json {
        println!("{}", render_json(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        ctx.renderer.print_status("info", "no new upgrades");
        return Ok(());
    }
    ctx.renderer.print_section("new upgrades");
    ctx.renderer.print_lines(&format_upgradable_lines(&rows));
    Ok(())
}

fn run_to_upgrade_command(ctx: &CliContext, index: &dyn PackageIndex, json: bool) -> Result<()> {
    let store = initialised_store(ctx, index)?;
    let installed = capture_installed(index)?;
    let rows = upgradable(&installed, &store.current()?);

    if json {
        println!("{}", render_json(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        ctx.renderer.print_status("ok", "all installed packages match the available versions");
        return Ok(());
    }
    ctx.renderer.print_section("upgradable");
    ctx.renderer.print_lines(&format_upgradable_lines(&rows));
    Ok(())
}

fn run_status_command(ctx: &CliContext, index: &dyn PackageIndex, json: bool) -> Result<()> {
    let store = initialised_store(ctx, index)?;
    let logger = ChangeLogger::new(&ctx.config, index);
    let summary = store.summary()?;
    let installed = capture_installed(index)?;
    let previous = store.previous()?;
    let current = store.current()?;

    let report = StatusReport::new(
        ctx.config.host(),
        &store.layout().host_dir().display().to_string(),
        &summary,
        upgrade_count(&installed, &previous, &current),
        upgradable(&installed, &current).len(),
        logger.has_pending_bracket(),
    );

    if json {
        println!("{}", render_json(&report)?);
        return Ok(());
    }
    ctx.renderer.print_section("status");
    ctx.renderer
        .print_lines(&format_status_lines(&report, ctx.renderer.style()));
    Ok(())
}

/// Runs a mutating apt-get action inside a change-log bracket. The bracket
/// is finished even when apt-get fails; the apt-get failure wins.
pub(crate) fn run_logged_command(
    ctx: &CliContext,
    index: &dyn PackageIndex,
    action: AptAction,
    packages: &[String],
) -> Result<()> {
    let logger = ChangeLogger::new(&ctx.config, index);
    let bracket = logger
        .start_log()
        .with_context(|| format!("failed to start change log for {}", action.as_str()))?;

    let apt_result = ctx.apt_get.run(action, packages);
    let recorded = logger.finish_log(bracket);

    match &recorded {
        Ok(events) if events.is_empty() => {
            ctx.renderer.print_status("info", "no installed-state changes");
        }
        Ok(events) => {
            ctx.renderer.print_section("changes");
            ctx.renderer
                .print_lines(&format_change_event_lines(events, ctx.renderer.style()));
        }
        Err(err) => {
            ctx.renderer
                .print_status("error", &format!("failed to record package changes: {err}"));
        }
    }

    apt_result?;
    recorded.with_context(|| format!("failed to finish change log for {}", action.as_str()))?;
    Ok(())
}

fn run_list_log_command(
    ctx: &CliContext,
    index: &dyn PackageIndex,
    tail: Option<usize>,
    package: Option<&str>,
    json: bool,
) -> Result<()> {
    let logger = ChangeLogger::new(&ctx.config, index);
    let events = filter_change_events(logger.read_log()?, tail, package);

    if json {
        println!("{}", render_json(&events)?);
        return Ok(());
    }
    if events.is_empty() {
        ctx.renderer.print_status("info", "no recorded changes");
        return Ok(());
    }
    ctx.renderer
        .print_lines(&format_change_event_lines(&events, ctx.renderer.style()));
    Ok(())
}

fn run_reset_command(ctx: &CliContext, index: &dyn PackageIndex) -> Result<()> {
    let store = SnapshotStore::new(&ctx.config, index);
    let report = store.reset()?;
    ctx.renderer.print_status(
        "ok",
        &format!(
            "reset package snapshots: {} available packages",
            report.available
        ),
    );
    Ok(())
}

fn run_doctor_command(ctx: &CliContext, index: &dyn PackageIndex) -> Result<()> {
    let store = SnapshotStore::new(&ctx.config, index);
    let logger = ChangeLogger::new(&ctx.config, index);
    let layout = store.layout();
    let config_path = settings_path(ctx.config.root());
    let lock_state = if layout.host_dir().exists() {
        if StateLock::is_held(layout)? {
            "held"
        } else {
            "free"
        }
    } else {
        "absent"
    };
    let elevation = ctx.settings.elevation();

    ctx.renderer.print_lines(&[
        format!("state root: {}", ctx.config.root().display()),
        format!("host: {}", ctx.config.host()),
        format!("host dir: {}", layout.host_dir().display()),
        format!(
            "config: {} ({})",
            config_path.display(),
            if config_path.exists() { "present" } else { "defaults" }
        ),
        format!(
            "snapshot: {}",
            if layout.available_path().exists() {
                "initialised"
            } else {
                "not initialised"
            }
        ),
        format!("lock: {lock_state}"),
        format!(
            "elevation: {}",
            if elevation.is_empty() {
                "disabled".to_string()
            } else {
                elevation.join(" ")
            }
        ),
    ]);
    if logger.has_pending_bracket() {
        ctx.renderer.print_status(
            "warn",
            &format!(
                "pending change-log bracket: {}",
                layout.pre_image_path().display()
            ),
        );
    }
    Ok(())
}

fn initialised_store<'a>(
    ctx: &CliContext,
    index: &'a dyn PackageIndex,
) -> Result<SnapshotStore<'a>> {
    let store = SnapshotStore::new(&ctx.config, index);
    if store.ensure_initialised()? {
        ctx.renderer
            .print_status("info", "took a baseline snapshot of available packages");
    }
    Ok(store)
}

fn capture_installed(index: &dyn PackageIndex) -> Result<Snapshot> {
    let entries = index
        .installed_packages()
        .context("failed to read installed packages")?;
    Ok(Snapshot::from_entries(entries))
}
