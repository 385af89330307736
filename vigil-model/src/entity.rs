use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A (name, version) pair identifying installed or observed software.
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
pub struct SoftwareId {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl SoftwareId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Free-text search phrase, `"name version"` without trailing blanks.
    pub fn search_phrase(&self) -> String {
        format!("{} {}", self.name.trim(), self.version.trim())
            .trim()
            .to_string()
    }
}

impl fmt::Display for SoftwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.version)
        }
    }
}

/// Subject of enrichment.
///
/// An IP entity keeps the raw string it was discovered with. Validation
/// happens at the adapter boundary through [`Entity::as_ipv4`], so a
/// malformed address still flows through the pipeline and is reported as
/// invalid input rather than dropped.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Ip { address: String },
    Software(SoftwareId),
}

impl Entity {
    pub fn ip(address: impl Into<String>) -> Self {
        Entity::Ip {
            address: address.into(),
        }
    }

    pub fn software(
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Entity::Software(SoftwareId::new(name, version))
    }

    /// Canonical identity string. Two entities are the same entity iff
    /// their canonical keys are byte-equal. Software keys are
    /// `name:version` with `%` and `:` percent-escaped in both parts, so
    /// epoch versions such as `1:2.30-1` cannot collide.
    pub fn canonical_key(&self) -> String {
        match self {
            Entity::Ip { address } => address.clone(),
            Entity::Software(sw) => {
                format!("{}:{}", escape_key(&sw.name), escape_key(&sw.version))
            }
        }
    }

    /// Strict dotted-quad parse. Out-of-range octets, missing octets,
    /// non-numeric text and leading zeros all yield `None`.
    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            Entity::Ip { address } => Ipv4Addr::from_str(address).ok(),
            Entity::Software(_) => None,
        }
    }

    pub fn as_software(&self) -> Option<&SoftwareId> {
        match self {
            Entity::Software(sw) => Some(sw),
            Entity::Ip { .. } => None,
        }
    }

    pub fn is_ip(&self) -> bool {
        matches!(self, Entity::Ip { .. })
    }
}

fn escape_key(part: &str) -> String {
    part.replace('%', "%25").replace(':', "%3A")
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Ip { address } => write!(f, "{address}"),
            Entity::Software(sw) => write!(f, "{sw}"),
        }
    }
}

/// Parses the command-line form: `name@version` is software, anything
/// else is taken as an IP entity.
impl FromStr for Entity {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ModelError::InvalidEntity("empty entity".into()));
        }

        match raw.split_once('@') {
            Some((name, _)) if name.trim().is_empty() => Err(
                ModelError::InvalidEntity(format!("missing name in '{raw}'")),
            ),
            Some((name, version)) => {
                Ok(Entity::software(name.trim(), version.trim()))
            }
            None => Ok(Entity::ip(raw)),
        }
    }
}

impl From<SoftwareId> for Entity {
    fn from(sw: SoftwareId) -> Self {
        Entity::Software(sw)
    }
}

impl From<Ipv4Addr> for Entity {
    fn from(addr: Ipv4Addr) -> Self {
        Entity::ip(addr.to_string())
    }
}
