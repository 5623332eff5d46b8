//! Shared fixtures for behavioral specs

#![allow(dead_code)]

pub use std::sync::{Arc, Barrier, Mutex};
pub use std::thread;
pub use std::time::Duration;
pub use turnstile_core::{CoordinatorConfig, ErrorKind, Operation};
pub use turnstile_engine::{
    AcquireOptions, CancelToken, DirRegistry, MemoryRegistry, OpenOptions, Registry,
    RegionOptions,
};
pub use turnstile_storage::{DirStore, Store};

use std::path::Path;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Upper bound for waits that are expected to succeed
pub const WAIT: Option<Duration> = Some(Duration::from_secs(10));

/// A scratch state directory
pub struct Namespace {
    dir: TempDir,
}

/// Route engine logs to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Namespace {
    pub fn empty() -> Self {
        init_tracing();
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> CoordinatorConfig {
        CoordinatorConfig::new()
            .with_state_dir(self.dir.path())
            .with_poll_interval(Duration::from_millis(2))
            .with_watchdog_interval(Duration::from_millis(50))
            .with_stale_threshold(Duration::from_millis(100))
    }

    /// A registry with its own store, as another process would have
    pub fn registry(&self) -> DirRegistry {
        Registry::open_dir(self.config()).unwrap()
    }
}

pub fn memory_registry() -> MemoryRegistry {
    init_tracing();
    Registry::in_memory(
        CoordinatorConfig::new()
            .with_poll_interval(Duration::from_millis(2))
            .with_watchdog_interval(Duration::from_millis(50))
            .with_stale_threshold(Duration::from_millis(100)),
    )
}

pub fn create() -> OpenOptions {
    OpenOptions::new().create(true)
}
