// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine unit tests

use crate::registry::Registry;
use std::time::Duration;
use turnstile_core::{CoordinatorConfig, FakeClock, FakeLiveness};
use turnstile_storage::MemoryStore;

pub(crate) type TestRegistry = Registry<MemoryStore, FakeClock, FakeLiveness>;

pub(crate) const STALE: Duration = Duration::from_secs(10);

pub(crate) fn test_config() -> CoordinatorConfig {
    CoordinatorConfig::new()
        .with_stale_threshold(STALE)
        .with_watchdog_interval(Duration::from_millis(20))
        .with_poll_interval(Duration::from_millis(2))
}

/// In-memory registry with controllable time and liveness
pub(crate) fn test_registry() -> (TestRegistry, FakeClock, FakeLiveness) {
    let clock = FakeClock::new();
    let liveness = FakeLiveness::new();
    let registry = Registry::new(
        MemoryStore::new(),
        clock.clone(),
        liveness.clone(),
        test_config(),
    );
    (registry, clock, liveness)
}
