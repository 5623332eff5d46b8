// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Holder identity

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

const BOOT_ID_PATH: &str = "/proc/sys/kernel/random/boot_id";

static NEXT_THREAD_SEQ: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_SEQ: u64 = NEXT_THREAD_SEQ.fetch_add(1, Ordering::Relaxed);
}

/// Sequence number of the calling thread, unique within this process
pub fn current_thread_seq() -> u64 {
    THREAD_SEQ.with(|seq| *seq)
}

/// Identifier of the running boot, or empty where the kernel exposes none
pub fn current_boot_id() -> &'static str {
    static BOOT_ID: OnceLock<String> = OnceLock::new();
    BOOT_ID.get_or_init(|| {
        std::fs::read_to_string(BOOT_ID_PATH)
            .map(|id| id.trim().to_string())
            .unwrap_or_default()
    })
}

/// Identifies a participant claiming capacity: the process, the thread that
/// made the claim, and the handle it was made through.
///
/// The handle is the logical holder. Grants are matched by handle on release,
/// so a handle may be moved between threads of the same process. Pids and
/// monotonic timestamps only mean something within the boot that recorded
/// them, so the boot id travels along.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderId {
    pub pid: u32,
    pub thread: u64,
    pub handle: String,
    #[serde(default)]
    pub boot: String,
}

impl HolderId {
    pub fn new(pid: u32, thread: u64, handle: impl Into<String>) -> Self {
        Self {
            pid,
            thread,
            handle: handle.into(),
            boot: current_boot_id().to_string(),
        }
    }

    pub fn with_boot(mut self, boot: impl Into<String>) -> Self {
        self.boot = boot.into();
        self
    }

    /// Recorded during an earlier boot; its process is gone and its
    /// timestamps are meaningless
    pub fn from_earlier_boot(&self) -> bool {
        let current = current_boot_id();
        !self.boot.is_empty() && !current.is_empty() && self.boot != current
    }

    /// The calling thread of this process, claiming through `handle`
    pub fn current(handle: &str) -> Self {
        Self::new(std::process::id(), current_thread_seq(), handle)
    }

    /// Generate an opaque handle id
    pub fn fresh_handle() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    pub fn same_handle(&self, other: &HolderId) -> bool {
        self.handle == other.handle
    }
}

impl std::fmt::Display for HolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.pid, self.thread, self.handle)
    }
}
