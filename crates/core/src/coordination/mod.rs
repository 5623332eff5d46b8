// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination primitives shared across processes
//!
//! This module provides:
//! - **Semaphore** - Weighted counting object with a FIFO wait queue
//! - **RegionRecord** - Bookkeeping for a fixed-size shared byte region
//! - **HolderId** - Identity of the process, thread and handle claiming units

pub mod holder;
pub mod region;
pub mod semaphore;

pub use holder::{current_boot_id, current_thread_seq, HolderId};
pub use region::{RegionInput, RegionRecord};
pub use semaphore::{
    Attachment, Outcome, Semaphore, SemaphoreConfig, SemaphoreHolder, SemaphoreInput,
    SemaphoreStatus, Step, Waiter,
};
