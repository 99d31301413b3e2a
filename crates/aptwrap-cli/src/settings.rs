use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

const SETTINGS_FILE_NAME: &str = "config.toml";
const HOSTNAME_SOURCES: [&str; 2] = ["/proc/sys/kernel/hostname", "/etc/hostname"];
const FALLBACK_HOST: &str = "localhost";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutputPreference {
    #[default]
    Auto,
    Plain,
    Rich,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SettingsFile {
    #[serde(default = "settings_file_version")]
    pub(crate) version: u32,
    #[serde(default)]
    pub(crate) host: Option<String>,
    #[serde(default = "default_elevate")]
    pub(crate) elevate: String,
    #[serde(default)]
    pub(crate) output: OutputPreference,
    #[serde(default)]
    pub(crate) assume_yes: bool,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            version: settings_file_version(),
            host: None,
            elevate: default_elevate(),
            output: OutputPreference::Auto,
            assume_yes: false,
        }
    }
}

impl SettingsFile {
    /// The command prefix used to run `apt-get` with privileges. Empty when
    /// elevation is disabled.
    pub(crate) fn elevation(&self) -> Vec<String> {
        self.elevate
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

pub(crate) fn settings_file_version() -> u32 {
    1
}

fn default_elevate() -> String {
    "sudo".to_string()
}

pub(crate) fn parse_settings_file(content: &str) -> Result<SettingsFile> {
    let parsed = toml::from_str::<SettingsFile>(content).context("failed parsing config.toml")?;
    let expected = settings_file_version();
    if parsed.version != expected {
        anyhow::bail!(
            "unsupported config version {} (expected {}): update config.toml to version {}",
            parsed.version,
            expected,
            expected
        );
    }
    Ok(parsed)
}

pub(crate) fn settings_path(state_root: &Path) -> PathBuf {
    state_root.join(SETTINGS_FILE_NAME)
}

pub(crate) fn load_settings(state_root: &Path) -> Result<SettingsFile> {
    let path = settings_path(state_root);
    if !path.exists() {
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(SettingsFile::default());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    parse_settings_file(&content).with_context(|| format!("invalid config: {}", path.display()))
}

pub(crate) fn default_state_root() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set; cannot resolve state root")?;
    Ok(PathBuf::from(home).join(".aptwrap"))
}

pub(crate) fn resolve_host(flag: Option<&str>, settings: &SettingsFile) -> String {
    if let Some(host) = flag {
        return host.to_string();
    }
    if let Some(host) = settings.host.as_deref() {
        return host.to_string();
    }
    detect_hostname(&HOSTNAME_SOURCES.map(Path::new))
}

/// First non-empty line among `sources`, or `localhost`.
pub(crate) fn detect_hostname(sources: &[&Path]) -> String {
    sources
        .iter()
        .filter_map(|path| fs::read_to_string(path).ok())
        .filter_map(|raw| raw.lines().next().map(|line| line.trim().to_string()))
        .find(|host| !host.is_empty())
        .unwrap_or_else(|| FALLBACK_HOST.to_string())
}
