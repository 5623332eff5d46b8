// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator configuration
//!
//! Loaded from TOML with humantime durations:
//!
//! ```toml
//! state_dir = "/run/user/1000/turnstile"
//! stale_threshold = "30s"
//! watchdog_interval = "5s"
//! poll_interval = "5ms"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding the state directory
pub const STATE_DIR_ENV: &str = "TURNSTILE_STATE_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Root of the on-disk namespace; resolved from the environment when unset
    pub state_dir: Option<PathBuf>,
    /// Idle time after which a dead holder's grant is reclaimed
    #[serde(with = "humantime_serde")]
    pub stale_threshold: Duration,
    /// How long an acquire blocks before it runs a recovery sweep
    #[serde(with = "humantime_serde")]
    pub watchdog_interval: Duration,
    /// Upper bound on how long a waiter sleeps between checks
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            stale_threshold: Duration::from_secs(30),
            watchdog_interval: Duration::from_secs(5),
            poll_interval: Duration::from_millis(5),
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: CoordinatorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll_interval must be non-zero".into()));
        }
        if self.watchdog_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "watchdog_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// State directory: configured, then `TURNSTILE_STATE_DIR`, then the
    /// user's runtime dir, then the user's state dir, then the temp dir
    pub fn resolve_state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }
        if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        dirs::runtime_dir()
            .or_else(dirs::state_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("turnstile")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
