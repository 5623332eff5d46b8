// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness checks used by stale-owner recovery

use crate::coordination::HolderId;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Reports whether the participant behind a holder can still release
pub trait LivenessCheck: Clone + Send + Sync + 'static {
    fn is_alive(&self, holder: &HolderId) -> bool;
}

/// Probes the holder's process with signal 0
///
/// Threads of a live process are assumed alive.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessLiveness;

impl LivenessCheck for ProcessLiveness {
    fn is_alive(&self, holder: &HolderId) -> bool {
        // The pid may have been reused since
        if holder.from_earlier_boot() {
            return false;
        }
        let Ok(raw) = i32::try_from(holder.pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }
        match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            // Exists but belongs to another user
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

/// Treats every holder as alive, disabling reclamation
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysAlive;

impl LivenessCheck for AlwaysAlive {
    fn is_alive(&self, _holder: &HolderId) -> bool {
        true
    }
}

#[derive(Debug, Default)]
struct Dead {
    pids: HashSet<u32>,
    handles: HashSet<String>,
}

/// Liveness controlled by tests: holders are alive until marked dead
#[derive(Clone, Debug, Default)]
pub struct FakeLiveness {
    dead: Arc<Mutex<Dead>>,
}

impl FakeLiveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every holder of a process as dead
    pub fn kill_pid(&self, pid: u32) {
        self.lock().pids.insert(pid);
    }

    /// Mark the holder behind one handle as dead
    pub fn kill_handle(&self, handle: &str) {
        self.lock().handles.insert(handle.to_string());
    }

    pub fn revive_all(&self) {
        let mut dead = self.lock();
        dead.pids.clear();
        dead.handles.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Dead> {
        self.dead.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LivenessCheck for FakeLiveness {
    fn is_alive(&self, holder: &HolderId) -> bool {
        let dead = self.lock();
        !holder.from_earlier_boot()
            && !dead.pids.contains(&holder.pid)
            && !dead.handles.contains(&holder.handle)
    }
}
