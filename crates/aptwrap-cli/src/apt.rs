use std::ffi::OsStr;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use aptwrap_core::{parse_dpkg_query, parse_dumpavail, PackageEntry};
use aptwrap_state::PackageIndex;
use tracing::{debug, info};

use crate::render::TerminalRenderer;

const DPKG_QUERY_FORMAT: &str = "${Package}\t${Version}\t${db:Status-Abbrev}\n";

/// `PackageIndex` backed by `apt-cache` and `dpkg-query`.
pub(crate) struct AptIndex {
    renderer: TerminalRenderer,
}

impl AptIndex {
    pub(crate) fn new(renderer: TerminalRenderer) -> Self {
        Self { renderer }
    }
}

impl PackageIndex for AptIndex {
    fn available_packages(&self) -> Result<Vec<PackageEntry>> {
        let stdout = self.renderer.with_spinner("reading available packages", || {
            let mut command = Command::new("apt-cache");
            command.arg("dumpavail");
            run_capture(&mut command, "apt-cache dumpavail failed")
        })?;
        let entries = parse_dumpavail(&stdout);
        debug!(entries = entries.len(), "parsed apt-cache dumpavail");
        Ok(entries)
    }

    fn installed_packages(&self) -> Result<Vec<PackageEntry>> {
        let stdout = self.renderer.with_spinner("reading installed packages", || {
            let mut command = Command::new("dpkg-query");
            command
                .arg("--show")
                .arg(format!("--showformat={DPKG_QUERY_FORMAT}"));
            run_capture(&mut command, "dpkg-query failed")
        })?;
        let entries = parse_dpkg_query(&stdout);
        debug!(entries = entries.len(), "parsed dpkg-query output");
        Ok(entries)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum AptAction {
    Update,
    Install,
    Remove,
    Purge,
    Upgrade,
    DistUpgrade,
    Autoremove,
}

impl AptAction {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Purge => "purge",
            Self::Upgrade => "upgrade",
            Self::DistUpgrade => "dist-upgrade",
            Self::Autoremove => "autoremove",
        }
    }

    /// Whether the action changes the set of installed packages.
    pub(crate) fn changes_installed(self) -> bool {
        self != Self::Update
    }
}

/// Builds `apt-get` invocations, prefixed with the configured elevation
/// command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AptGet {
    elevation: Vec<String>,
    assume_yes: bool,
}

impl AptGet {
    pub(crate) fn new(elevation: Vec<String>, assume_yes: bool) -> Self {
        Self {
            elevation,
            assume_yes,
        }
    }

    pub(crate) fn argv(&self, action: AptAction, packages: &[String]) -> Vec<String> {
        let mut argv = self.elevation.clone();
        argv.push("apt-get".to_string());
        if self.assume_yes && action.changes_installed() {
            argv.push("-y".to_string());
        }
        argv.push(action.as_str().to_string());
        argv.extend(packages.iter().cloned());
        argv
    }

    /// Runs `apt-get` attached to the terminal so prompts and progress reach
    /// the user.
    pub(crate) fn run(&self, action: AptAction, packages: &[String]) -> Result<()> {
        let argv = self.argv(action, packages);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("empty apt-get command line"))?;
        info!(command = %argv.join(" "), "running apt-get");

        let mut command = Command::new(program);
        command.args(args);
        run_attached(&mut command, &format!("apt-get {} failed", action.as_str()))
    }
}

fn run_capture(command: &mut Command, context_message: &str) -> Result<String> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(decode_output(&output.stdout));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(anyhow!(
        "{context_message}: status={} stderr='{}'",
        output.status,
        stderr.trim()
    ))
}

/// Only `Package` and `Version` are read downstream, so invalid bytes in
/// free-text fields are replaced rather than rejected.
pub(crate) fn decode_output(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn run_attached(command: &mut Command, context_message: &str) -> Result<()> {
    let program = command.get_program().to_owned();
    let status = command.status().with_context(|| {
        format!(
            "{context_message}: {} failed to start",
            display_program(&program)
        )
    })?;
    if status.success() {
        return Ok(());
    }
    Err(anyhow!("{context_message}: status={status}"))
}

fn display_program(program: &OsStr) -> String {
    program.to_string_lossy().into_owned()
}
