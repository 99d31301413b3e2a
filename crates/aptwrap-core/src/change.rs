use std::fmt;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::ParseError;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Install,
    Remove,
    Upgrade,
    Downgrade,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Upgrade => "upgrade",
            Self::Downgrade => "downgrade",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "install" => Some(Self::Install),
            "remove" => Some(Self::Remove),
            "upgrade" => Some(Self::Upgrade),
            "downgrade" => Some(Self::Downgrade),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One difference between two installed-package captures.
///
/// `Remove` carries the version that was installed before; the other
/// variants carry the version installed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Install { name: String, version: String },
    Remove { name: String, version: String },
    Upgrade { name: String, version: String },
    Downgrade { name: String, version: String },
}

impl Change {
    pub fn new(kind: ChangeKind, name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        match kind {
            ChangeKind::Install => Self::Install { name, version },
            ChangeKind::Remove => Self::Remove { name, version },
            ChangeKind::Upgrade => Self::Upgrade { name, version },
            ChangeKind::Downgrade => Self::Downgrade { name, version },
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Install { .. } => ChangeKind::Install,
            Self::Remove { .. } => ChangeKind::Remove,
            Self::Upgrade { .. } => ChangeKind::Upgrade,
            Self::Downgrade { .. } => ChangeKind::Downgrade,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Install { name, .. }
            | Self::Remove { name, .. }
            | Self::Upgrade { name, .. }
            | Self::Downgrade { name, .. } => name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Self::Install { version, .. }
            | Self::Remove { version, .. }
            | Self::Upgrade { version, .. }
            | Self::Downgrade { version, .. } => version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub timestamp: NaiveDateTime,
    pub change: Change,
}

impl ChangeEvent {
    pub fn new(timestamp: NaiveDateTime, change: Change) -> Self {
        Self { timestamp, change }
    }

    pub fn kind(&self) -> ChangeKind {
        self.change.kind()
    }

    pub fn name(&self) -> &str {
        self.change.name()
    }

    pub fn version(&self) -> &str {
        self.change.version()
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.kind(),
            self.name(),
            self.version()
        )
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let timestamp = NaiveDateTime::parse_from_str(fields.next()?, TIMESTAMP_FORMAT).ok()?;
        let kind = ChangeKind::parse(fields.next()?)?;
        let name = fields.next()?;
        let version = fields.next()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self::new(timestamp, Change::new(kind, name, version)))
    }
}

#[derive(Serialize)]
struct ChangeEventRecord<'a> {
    timestamp: String,
    kind: ChangeKind,
    name: &'a str,
    version: &'a str,
}

impl Serialize for ChangeEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ChangeEventRecord {
            timestamp: self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            kind: self.kind(),
            name: self.name(),
            version: self.version(),
        }
        .serialize(serializer)
    }
}

pub fn parse_change_log(raw: &str) -> Result<Vec<ChangeEvent>, ParseError> {
    let mut events = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event = ChangeEvent::parse_line(line).ok_or_else(|| ParseError::MalformedEvent {
            line_no: index + 1,
            line: line.to_string(),
        })?;
        events.push(event);
    }
    Ok(events)
}
