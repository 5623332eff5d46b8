// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! turnstile-core: pure state for cross-process coordination
//!
//! This crate provides:
//! - Semaphore and shared region state machines
//! - Holder identity, clocks and liveness checks
//! - Events, errors and configuration shared by the storage and engine crates

pub mod clock;
pub mod config;
pub mod coordination;
pub mod error;
pub mod event;
pub mod liveness;

pub use clock::{Clock, FakeClock, SystemClock, Timestamp};
pub use config::{ConfigError, CoordinatorConfig, STATE_DIR_ENV};
pub use coordination::{
    current_boot_id, HolderId, Outcome, RegionInput, RegionRecord, Semaphore, SemaphoreConfig,
    SemaphoreInput, SemaphoreStatus, Step,
};
pub use error::{CoordError, ErrorKind, Operation, Refusal};
pub use event::Event;
pub use liveness::{AlwaysAlive, FakeLiveness, LivenessCheck, ProcessLiveness};
