// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic maintenance task for coordination objects
//!
//! Provides a background sweep for stale holders and health warnings.

use crate::recovery::SweepReport;
use crate::registry::Registry;
use std::time::Duration;
use turnstile_core::{Clock, CoordError, LivenessCheck};
use turnstile_storage::Store;

/// Configuration for maintenance task
#[derive(Clone, Debug)]
pub struct MaintenanceConfig {
    /// How often to run maintenance
    pub interval: Duration,
    /// Whether to reclaim units held by dead participants
    pub reclaim_stale: bool,
    /// Whether to warn about holders idle past the staleness threshold
    pub emit_warnings: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            reclaim_stale: true,
            emit_warnings: true,
        }
    }
}

impl MaintenanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_reclaim_stale(mut self, enabled: bool) -> Self {
        self.reclaim_stale = enabled;
        self
    }

    pub fn with_emit_warnings(mut self, enabled: bool) -> Self {
        self.emit_warnings = enabled;
        self
    }
}

/// Background maintenance task for a registry
pub struct MaintenanceTask<S: Store, C: Clock, L: LivenessCheck> {
    config: MaintenanceConfig,
    registry: Registry<S, C, L>,
}

impl<S: Store, C: Clock, L: LivenessCheck> Clone for MaintenanceTask<S, C, L> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<S: Store, C: Clock, L: LivenessCheck> MaintenanceTask<S, C, L> {
    pub fn new(config: MaintenanceConfig, registry: Registry<S, C, L>) -> Self {
        Self { config, registry }
    }

    /// Run a single maintenance cycle
    ///
    /// Returns what the sweep changed; empty when reclaiming is disabled.
    pub fn tick(&self) -> Result<SweepReport, CoordError> {
        if self.config.emit_warnings {
            let stats = self.registry.stats()?;
            if stats.stale_holders > 0 {
                tracing::warn!(
                    stale_holders = stats.stale_holders,
                    total_holders = stats.total_holders,
                    "holders idle past the staleness threshold"
                );
            }
        }

        if self.config.reclaim_stale {
            return self.registry.sweep_all();
        }
        Ok(SweepReport::default())
    }

    /// Get the maintenance interval
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn registry(&self) -> &Registry<S, C, L> {
        &self.registry
    }
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
