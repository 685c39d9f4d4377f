// src/config.rs
//! Router configuration.
//!
//! Loaded from a JSON file:
//!
//! ```json
//! {
//!   "name": "/ndn/a",
//!   "sync": "/dv/sync",
//!   "links": [{ "other_name": "/ndn/b", "other_ip": "10.0.0.2" }],
//!   "prefixes": ["/app/a"]
//! }
//! ```
//!
//! Everything except `name` has a default.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::name::Name;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A configured neighbor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub other_name: Name,
    pub other_ip: String,
    /// Pre-existing face towards the neighbor. Skips face creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faceid: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvConfig {
    /// Router name.
    pub name: Name,

    /// Sync group of the prefix logs.
    #[serde(default = "default_sync")]
    pub sync: Name,

    #[serde(default)]
    pub links: Vec<LinkConfig>,

    /// Prefixes this router serves.
    #[serde(default)]
    pub prefixes: Vec<Name>,

    #[serde(default = "default_advertise_interval_ms")]
    pub advertise_interval_ms: u64,

    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    #[serde(default = "default_freshness_ms")]
    pub freshness_ms: u64,

    /// Consecutive fetch failures after which a neighbor or log is given up.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn default_sync() -> Name {
    Name::from_components(["dv", "sync"])
}

fn default_advertise_interval_ms() -> u64 {
    5000
}

fn default_fetch_timeout_ms() -> u64 {
    1000
}

fn default_freshness_ms() -> u64 {
    1000
}

fn default_failure_threshold() -> u32 {
    5
}

impl DvConfig {
    /// Config for `name` with defaults and no links.
    pub fn new(name: Name) -> Self {
        DvConfig {
            name,
            sync: default_sync(),
            links: Vec::new(),
            prefixes: Vec::new(),
            advertise_interval_ms: default_advertise_interval_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            freshness_ms: default_freshness_ms(),
            failure_threshold: default_failure_threshold(),
        }
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: DvConfig = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON array of router configs, as used by the simulator.
    pub fn load_topology(path: impl AsRef<Path>) -> Result<Vec<Self>, ConfigError> {
        let configs: Vec<DvConfig> = read_json(path.as_ref())?;
        let mut names = BTreeSet::new();
        for config in &configs {
            config.validate()?;
            if !names.insert(&config.name) {
                return Err(ConfigError::Invalid(format!(
                    "router {} appears twice",
                    config.name
                )));
            }
        }
        Ok(configs)
    }

    /// Add a neighbor.
    pub fn with_link(mut self, other_name: Name, other_ip: impl Into<String>) -> Self {
        self.links.push(LinkConfig {
            other_name,
            other_ip: other_ip.into(),
            faceid: None,
        });
        self
    }

    /// Add a neighbor reachable over an existing face.
    pub fn with_face(mut self, other_name: Name, other_ip: impl Into<String>, face: u64) -> Self {
        self.links.push(LinkConfig {
            other_name,
            other_ip: other_ip.into(),
            faceid: Some(face),
        });
        self
    }

    /// Serve `prefix` from this router.
    pub fn with_prefix(mut self, prefix: Name) -> Self {
        self.prefixes.push(prefix);
        self
    }

    pub fn sync_group(mut self, group: Name) -> Self {
        self.sync = group;
        self
    }

    /// Set the heartbeat interval (in milliseconds).
    pub fn heartbeat_interval_ms(mut self, value: u64) -> Self {
        self.advertise_interval_ms = value;
        self
    }

    /// Set the per-fetch timeout (in milliseconds).
    pub fn fetch_timeout_ms(mut self, value: u64) -> Self {
        self.fetch_timeout_ms = value;
        self
    }

    pub fn failure_threshold(mut self, value: u32) -> Self {
        self.failure_threshold = value;
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.advertise_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }

    /// Reject configurations the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("router name is empty".into()));
        }
        if self.advertise_interval_ms == 0 {
            return Err(ConfigError::Invalid("advertise_interval_ms is 0".into()));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid("failure_threshold is 0".into()));
        }

        let mut seen = BTreeSet::new();
        for link in &self.links {
            if link.other_name == self.name {
                return Err(ConfigError::Invalid(format!(
                    "{} has a link to itself",
                    self.name
                )));
            }
            if !seen.insert(&link.other_name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate link to {}",
                    link.other_name
                )));
            }
        }
        Ok(())
    }
}
