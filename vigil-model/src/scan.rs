use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Body of `POST /scan`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub args: Option<String>,
}

impl ScanRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            args: None,
        }
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }

    /// The target, if present and not blank.
    pub fn target(&self) -> Option<&str> {
        self.target
            .as_deref()
            .map(str::trim)
            .filter(|target| !target.is_empty())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    Up,
    Down,
    #[default]
    Unknown,
}

impl HostState {
    /// Maps a scanner status word (`Up`, `down`, ...) onto a state.
    pub fn from_status(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "up" => HostState::Up,
            "down" => HostState::Down,
            _ => HostState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostState::Up => "up",
            HostState::Down => "down",
            HostState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One port finding. Ordered by port number, then protocol.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
)]
pub struct PortRecord {
    pub port: u16,
    pub protocol: String,
    pub state: String,
    pub service: String,
    /// Empty when the scanner did not detect a version.
    #[serde(default)]
    pub version: String,
}

/// One host finding of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanHost {
    pub ip: String,
    pub hostnames: Vec<String>,
    pub state: HostState,
    #[serde(default = "unknown_os")]
    pub os: String,
    pub ports: BTreeSet<PortRecord>,
}

fn unknown_os() -> String {
    "Unknown".to_string()
}

impl ScanHost {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            hostnames: Vec::new(),
            state: HostState::Unknown,
            os: unknown_os(),
            ports: BTreeSet::new(),
        }
    }

    pub fn open_ports(&self) -> impl Iterator<Item = &PortRecord> {
        self.ports.iter().filter(|p| p.state == "open")
    }

    /// First detected product banner, used as the camera "manufacturer".
    pub fn product(&self) -> Option<&str> {
        self.ports
            .iter()
            .map(|p| p.version.trim())
            .find(|version| !version.is_empty())
    }
}
