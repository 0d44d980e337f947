//! Configuration struct definitions.
//!
//! Every section derives `Default` with the same values as `defaults.toml`,
//! so a partially written file deserializes cleanly.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Map engine and master map settings.
    pub map: MapSection,
    /// Commit conflict retry settings.
    pub commit: CommitSection,
    /// Logging settings.
    pub logging: LoggingSection,
}

/// `[map]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSection {
    /// Id of the master map holding channel registrations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_map_id: Option<i64>,
    /// Engine state file. Relative paths resolve against the workspace root.
    pub state_path: PathBuf,
    /// Root signing key file. Relative paths resolve against the workspace root.
    pub signing_key_path: PathBuf,
    /// Upper bound on any single map call, in milliseconds.
    pub call_timeout_ms: u64,
}

impl Default for MapSection {
    fn default() -> Self {
        Self {
            master_map_id: None,
            state_path: PathBuf::from(".revmap/state.json"),
            signing_key_path: PathBuf::from(".revmap/signing.key"),
            call_timeout_ms: 10_000,
        }
    }
}

impl MapSection {
    /// The per-call timeout.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// `[commit]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitSection {
    /// Retries after a lost conditional write. 0 disables retrying.
    pub max_retries: u32,
    /// Backoff before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Backoff cap, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for CommitSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 10,
            max_delay_ms: 200,
        }
    }
}

impl CommitSection {
    /// Backoff before the first retry.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Backoff cap.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default level filter.
    pub level: String,
    /// One of `pretty`, `compact`, `json`, `full`.
    pub format: String,
    /// Extra `EnvFilter` directives, e.g. `revmap_map=debug`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
