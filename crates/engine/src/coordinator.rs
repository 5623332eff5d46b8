// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counting coordinator
//!
//! An [`ObjectHandle`] is one attachment to a named semaphore. Acquires that
//! cannot be served join the object's FIFO queue and wait for the release that
//! grants their ticket.

use crate::cancel::CancelToken;
use crate::recovery::SweepReport;
use crate::registry::Registry;
use std::time::{Duration, Instant};
use turnstile_core::{
    Clock, CoordError, ErrorKind, HolderId, LivenessCheck, Operation, Outcome, Semaphore,
    SemaphoreInput, SemaphoreStatus,
};
use turnstile_storage::Store;

/// Bounds on a blocking acquire
#[derive(Clone, Debug, Default)]
pub struct AcquireOptions {
    /// Give up after this long; wait indefinitely when unset
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl AcquireOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// An open handle on a named semaphore
///
/// Dropping the handle detaches it; handles opened with `undo` release their
/// outstanding units first.
pub struct ObjectHandle<S: Store, C: Clock, L: LivenessCheck> {
    registry: Registry<S, C, L>,
    name: String,
    holder: HolderId,
    generation: String,
    capacity: u32,
    undo: bool,
    closed: bool,
}

impl<S: Store, C: Clock, L: LivenessCheck> std::fmt::Debug for ObjectHandle<S, C, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("name", &self.name)
            .field("holder", &self.holder)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<S: Store, C: Clock, L: LivenessCheck> ObjectHandle<S, C, L> {
    pub(crate) fn new(
        registry: Registry<S, C, L>,
        name: String,
        holder: HolderId,
        generation: String,
        capacity: u32,
        undo: bool,
    ) -> Self {
        Self {
            registry,
            name,
            holder,
            generation,
            capacity,
            undo,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Identity recorded for this handle's claims
    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    /// Identifies the incarnation of the object this handle is attached to
    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn registry(&self) -> &Registry<S, C, L> {
        &self.registry
    }

    /// The calling thread, claiming through this handle
    fn claimant(&self) -> HolderId {
        HolderId::current(&self.holder.handle)
    }

    fn apply(&self, op: Operation, input: SemaphoreInput) -> Result<Outcome, CoordError> {
        self.registry
            .apply(&self.name, &self.generation, op, input)
    }

    /// Block until `weight` units are granted or `timeout` elapses
    pub fn acquire(&self, weight: u32, timeout: Option<Duration>) -> Result<(), CoordError> {
        self.acquire_with(
            weight,
            &AcquireOptions {
                timeout,
                cancel: None,
            },
        )
    }

    /// Block until `weight` units are granted, the wait times out, the token
    /// is cancelled or the object is destroyed
    pub fn acquire_with(&self, weight: u32, options: &AcquireOptions) -> Result<(), CoordError> {
        let op = Operation::Acquire;
        let _span = tracing::debug_span!("object.acquire", name = %self.name, weight).entered();
        let start = Instant::now();

        let ticket = match self.apply(
            op,
            SemaphoreInput::Acquire {
                holder: self.claimant(),
                weight,
            },
        )? {
            Outcome::Queued(ticket) => ticket,
            _ => return Ok(()),
        };

        let config = self.registry.config();
        let notifier = self.registry.store().notifier();
        let mut last_sweep = start;
        loop {
            let seen = notifier.epoch();
            match self.apply(op, SemaphoreInput::Poll { ticket }) {
                Ok(Outcome::Granted(_)) => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    // Do not leave an orphaned ticket at the head of the queue
                    if e.kind() != ErrorKind::Removed {
                        if let Err(abandon) = self.apply(op, SemaphoreInput::Abandon { ticket }) {
                            tracing::warn!(
                                name = %self.name,
                                ticket,
                                error = %abandon,
                                "failed to abandon ticket"
                            );
                        }
                    }
                    return Err(e);
                }
            }

            if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return self.abandon(
                    ticket,
                    CoordError::Cancelled {
                        name: self.name.clone(),
                        op,
                    },
                );
            }

            let waited = start.elapsed();
            let remaining = match options.timeout {
                Some(timeout) if waited >= timeout => {
                    return self.abandon(
                        ticket,
                        CoordError::Timeout {
                            name: self.name.clone(),
                            op,
                            waited,
                        },
                    );
                }
                Some(timeout) => Some(timeout - waited),
                None => None,
            };

            if last_sweep.elapsed() >= config.watchdog_interval {
                last_sweep = Instant::now();
                match self.sweep() {
                    Ok(report) if !report.is_empty() => continue,
                    Ok(_) => {}
                    Err(e) => tracing::warn!(name = %self.name, error = %e, "recovery sweep failed"),
                }
            }

            let nap = remaining.map_or(config.poll_interval, |r| r.min(config.poll_interval));
            notifier.wait(seen, nap);
        }
    }

    /// Leave the queue, unless the grant won the race
    fn abandon(&self, ticket: u64, reason: CoordError) -> Result<(), CoordError> {
        match self.apply(Operation::Acquire, SemaphoreInput::Abandon { ticket })? {
            Outcome::Granted(_) => Ok(()),
            _ => Err(reason),
        }
    }

    /// Take `weight` units if available now, overtaking queued acquirers
    pub fn try_acquire(&self, weight: u32) -> Result<bool, CoordError> {
        let outcome = self.apply(
            Operation::TryAcquire,
            SemaphoreInput::TryAcquire {
                holder: self.claimant(),
                weight,
            },
        )?;
        Ok(matches!(outcome, Outcome::Granted(_)))
    }

    /// Return units held through this handle, then unowned units
    pub fn release(&self, weight: u32) -> Result<(), CoordError> {
        self.release_as(weight, Operation::Release)
    }

    pub(crate) fn release_as(&self, weight: u32, op: Operation) -> Result<(), CoordError> {
        self.apply(
            op,
            SemaphoreInput::Release {
                holder: self.claimant(),
                weight,
            },
        )
        .map(|_| ())
    }

    /// Give up ownership of held units without freeing them
    ///
    /// The units stay in use until any participant releases them.
    pub fn disown(&self, weight: u32) -> Result<(), CoordError> {
        self.disown_as(weight, Operation::Disown)
    }

    pub(crate) fn disown_as(&self, weight: u32, op: Operation) -> Result<(), CoordError> {
        self.apply(
            op,
            SemaphoreInput::Disown {
                holder: self.claimant(),
                weight,
            },
        )
        .map(|_| ())
    }

    /// Mark this handle's grants as recently active
    pub fn heartbeat(&self) -> Result<(), CoordError> {
        self.apply(
            Operation::Heartbeat,
            SemaphoreInput::Heartbeat {
                holder: self.claimant(),
            },
        )
        .map(|_| ())
    }

    /// Acquire and return a guard that releases on drop
    pub fn acquire_permit(
        &self,
        weight: u32,
        timeout: Option<Duration>,
    ) -> Result<Permit<'_, S, C, L>, CoordError> {
        self.acquire(weight, timeout)?;
        Ok(Permit {
            handle: self,
            weight,
            released: false,
        })
    }

    /// Units currently held through this handle
    pub fn held(&self) -> Result<u32, CoordError> {
        self.current(Operation::Status, |sem| sem.held_by(&self.holder))
    }

    pub fn status(&self) -> Result<SemaphoreStatus, CoordError> {
        self.current(Operation::Status, |sem| sem.status())
    }

    fn current<T>(
        &self,
        op: Operation,
        f: impl FnOnce(&Semaphore) -> T,
    ) -> Result<T, CoordError> {
        match self.registry.load(&self.name, op)? {
            Some(sem) if sem.generation == self.generation => Ok(f(&sem)),
            _ => Err(CoordError::Removed {
                name: self.name.clone(),
                op,
            }),
        }
    }

    /// Reclaim units held by dead participants of this object
    pub fn sweep(&self) -> Result<SweepReport, CoordError> {
        self.registry.sweep_object(&self.name)
    }

    /// Detach explicitly, surfacing any error
    pub fn close(mut self) -> Result<(), CoordError> {
        self.closed = true;
        self.detach()
    }

    fn detach(&self) -> Result<(), CoordError> {
        let op = Operation::Close;
        let clock = self.registry.clock();
        let holder = self.holder.clone();
        let undo = self.undo;
        self.registry.modify(&self.name, op, |slot, events| {
            let Some(current) = slot.as_ref().filter(|s| s.generation == self.generation) else {
                // Already deleted
                return Ok(());
            };
            let (next, step) = current
                .transition(SemaphoreInput::Detach { holder, undo }, clock)
                .map_err(|r| r.at(&self.name, op))?;
            events.extend(step.events);
            crate::registry::commit(slot, next, events);
            Ok(())
        })
    }
}

impl<S: Store, C: Clock, L: LivenessCheck> Drop for ObjectHandle<S, C, L> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.detach() {
            tracing::warn!(name = %self.name, error = %e, "failed to detach handle");
        }
    }
}

/// Units held until dropped or explicitly released
#[must_use = "dropping a permit releases it immediately"]
pub struct Permit<'a, S: Store, C: Clock, L: LivenessCheck> {
    handle: &'a ObjectHandle<S, C, L>,
    weight: u32,
    released: bool,
}

impl<S: Store, C: Clock, L: LivenessCheck> Permit<'_, S, C, L> {
    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn release(mut self) -> Result<(), CoordError> {
        self.released = true;
        self.handle.release(self.weight)
    }
}

impl<S: Store, C: Clock, L: LivenessCheck> Drop for Permit<'_, S, C, L> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.handle.release(self.weight) {
            tracing::warn!(name = %self.handle.name, error = %e, "failed to release permit");
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
