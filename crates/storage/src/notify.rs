// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process change notification

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Epoch counter bumped after every persisted change
///
/// Waiters read the epoch before checking state, then sleep until it moves.
/// Changes made by other processes never bump it; waiters bound their sleep
/// and re-check.
#[derive(Debug, Default)]
pub struct Notifier {
    epoch: Mutex<u64>,
    changed: Condvar,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        *self.epoch.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn bump(&self) {
        let mut epoch = self.epoch.lock().unwrap_or_else(|e| e.into_inner());
        *epoch = epoch.wrapping_add(1);
        self.changed.notify_all();
    }

    /// Block until the epoch differs from `seen` or `timeout` elapses
    ///
    /// Returns the epoch observed on wakeup.
    pub fn wait(&self, seen: u64, timeout: Duration) -> u64 {
        let deadline = Instant::now() + timeout;
        let mut epoch = self.epoch.lock().unwrap_or_else(|e| e.into_inner());
        while *epoch == seen {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .changed
                .wait_timeout(epoch, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            epoch = guard;
        }
        *epoch
    }
}
