// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Turnstile coordination engine
//!
//! Named semaphores, shared regions and turn handoff on top of a
//! [`turnstile_storage::Store`], with stale-owner recovery.

mod cancel;
mod coordinator;
mod handoff;
mod maintenance;
mod recovery;
mod region;
mod registry;
mod tasks;
#[cfg(test)]
mod test_support;

pub use cancel::{CancelOnDrop, CancelToken};
pub use coordinator::{AcquireOptions, ObjectHandle, Permit};
pub use handoff::{pass, Turn, TurnToken};
pub use maintenance::{MaintenanceConfig, MaintenanceTask};
pub use recovery::{sweep_region_record, sweep_semaphore, CoordinationStats, SweepReport};
pub use region::{RegionHandle, RegionOptions, MAX_REGION_SIZE};
pub use registry::{DirRegistry, MemoryRegistry, OpenOptions, Registry, MAX_NAME_LEN};
pub use tasks::{acquire_async, spawn_maintenance};
