// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tokio integration
//!
//! Blocking waits run on the blocking pool so async callers never stall a
//! runtime worker.

use crate::cancel::CancelToken;
use crate::coordinator::{AcquireOptions, ObjectHandle};
use crate::maintenance::MaintenanceTask;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use turnstile_core::{Clock, CoordError, LivenessCheck, Operation};
use turnstile_storage::Store;

/// Acquire `weight` units without blocking the runtime
///
/// Dropping the returned future cancels the wait. If the grant lands after
/// the caller has gone, the units are released again.
pub async fn acquire_async<S: Store, C: Clock, L: LivenessCheck>(
    handle: Arc<ObjectHandle<S, C, L>>,
    weight: u32,
    timeout: Option<Duration>,
) -> Result<(), CoordError> {
    let cancel = CancelToken::new();
    let _guard = cancel.drop_guard();
    let options = AcquireOptions {
        timeout,
        cancel: Some(cancel),
    };
    let (tx, rx) = tokio::sync::oneshot::channel();

    let worker = Arc::clone(&handle);
    tokio::task::spawn_blocking(move || {
        let result = worker.acquire_with(weight, &options);
        if let Err(Ok(())) = tx.send(result) {
            if let Err(e) = worker.release(weight) {
                tracing::warn!(name = worker.name(), error = %e, "failed to release orphaned grant");
            }
        }
    });

    match rx.await {
        Ok(result) => result,
        Err(_) => Err(CoordError::Cancelled {
            name: handle.name().to_string(),
            op: Operation::Acquire,
        }),
    }
}

/// Run `task` every interval until the returned handle is aborted
pub fn spawn_maintenance<S: Store, C: Clock, L: LivenessCheck>(
    task: MaintenanceTask<S, C, L>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = task.interval().max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let cycle = task.clone();
            match tokio::task::spawn_blocking(move || cycle.tick()).await {
                Ok(Ok(report)) if !report.is_empty() => {
                    tracing::debug!(?report, "maintenance cycle");
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "maintenance cycle failed"),
                Err(e) => tracing::error!(error = %e, "maintenance cycle panicked"),
            }
        }
    })
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
