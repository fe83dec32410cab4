//! Configuration for Conduit.
//!
//! Read from `~/.conduit/config.toml` unless a path is given. Every section and
//! key is optional. String values expand `${ENV_VAR}` references and a leading
//! `~/`.
//!
//! ```toml
//! [store]
//! path = "~/.conduit/processes.db"
//! lease_duration_ms = 60000
//! lease_holder = "conduit-1"
//!
//! [state_machine]
//! workers = 2
//! batch_size = 5
//! poll_interval_ms = 1000
//! max_send_attempts = 5
//!
//! [dispatch]
//! max_conflict_retries = 3
//!
//! [listeners]
//! slow_threshold_ms = 500
//! ```

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const CONFIG_DIR: &str = ".conduit";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    pub store: StoreConfig,
    pub state_machine: StateMachineConfig,
    pub dispatch: DispatchConfig,
    pub listeners: ListenersConfig,
}

/// Process store settings. Without a `path` the store lives in memory.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<String>,
    pub lease_duration_ms: i64,
    /// Name this instance leases records under. Random when unset.
    pub lease_holder: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            lease_duration_ms: 60_000,
            lease_holder: None,
        }
    }
}

impl StoreConfig {
    /// Database path with env vars and `~` expanded.
    #[must_use]
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.as_deref().map(|raw| expand_path(&expand_env_vars(raw)))
    }

    #[must_use]
    pub fn lease_holder(&self) -> String {
        match self.lease_holder.as_deref().map(expand_env_vars) {
            Some(holder) if !holder.trim().is_empty() => holder,
            _ => format!("conduit-{}", uuid::Uuid::new_v4()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StateMachineConfig {
    /// Polling tasks per process type.
    pub workers: usize,
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    pub max_send_attempts: u32,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            batch_size: 5,
            poll_interval_ms: 1000,
            max_send_attempts: 5,
        }
    }
}

impl StateMachineConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_conflict_retries: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ListenersConfig {
    pub slow_threshold_ms: u64,
}

impl Default for ListenersConfig {
    fn default() -> Self {
        Self {
            slow_threshold_ms: 500,
        }
    }
}

impl ListenersConfig {
    #[must_use]
    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }
}

impl ConduitConfig {
    /// Load the config at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!(path = %path.display(), error = %source, "Failed to read config");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        toml::from_str(&content).map_err(|source| {
            tracing::warn!(path = %path.display(), error = %source, "Failed to parse config");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Load the default config file. `Ok(None)` when there is none.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path).map(Some),
            _ => Ok(None),
        }
    }

    /// `~/.conduit/config.toml`.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join(CONFIG_FILE))
    }
}

/// `~/.conduit`, home of the config file, logs and the default database.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR))
}

/// Replace `${VAR}` references with the variable's value (empty when unset).
/// An unclosed `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + len];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[start + 3 + len..];
    }

    out.push_str(rest);
    out
}

fn expand_path(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(raw), |home| home.join(rest)),
        None => PathBuf::from(raw),
    }
}
