//! Runtime configuration for the tracker store.
//!
//! Values come from [`TrackerConfig::default`], the process environment via
//! [`TrackerConfig::from_env`], or the builder methods.

use std::env;
use std::path::PathBuf;

/// Default location of the dataset file, relative to the working directory.
pub const DEFAULT_DATA_PATH: &str = "watertracker.json";

pub const ENV_DATA_PATH: &str = "WATER_TRACKER_DATA_PATH";
pub const ENV_ATOMIC_WRITES: &str = "WATER_TRACKER_ATOMIC_WRITES";
pub const ENV_KEEP_BACKUP: &str = "WATER_TRACKER_KEEP_BACKUP";

/// Settings consumed by [`DataStore`](crate::tracker_store::DataStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Canonical dataset file.
    pub data_path: PathBuf,
    /// Write to `<file>.tmp` and rename into place instead of overwriting.
    pub atomic_writes: bool,
    /// Copy the previous good file to `<file>.bak` before replacing it.
    /// Only applies with `atomic_writes`.
    pub keep_backup: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            atomic_writes: true,
            keep_backup: true,
        }
    }
}

impl TrackerConfig {
    /// Snapshot of the configuration from the process environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_path: env::var_os(ENV_DATA_PATH)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            atomic_writes: env_flag(ENV_ATOMIC_WRITES).unwrap_or(defaults.atomic_writes),
            keep_backup: env_flag(ENV_KEEP_BACKUP).unwrap_or(defaults.keep_backup),
        }
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_atomic_writes(mut self, enabled: bool) -> Self {
        self.atomic_writes = enabled;
        self
    }

    pub fn with_keep_backup(mut self, enabled: bool) -> Self {
        self.keep_backup = enabled;
        self
    }
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|v| parse_flag(&v))
}

pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
