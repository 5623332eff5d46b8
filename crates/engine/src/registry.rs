// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named resource registry
//!
//! Maps names to coordination objects. Creating, attaching and destroying
//! each happen inside a single exclusive section of the store, so concurrent
//! openers of one name always end up sharing one object.

use crate::coordinator::ObjectHandle;
use std::sync::Arc;
use turnstile_core::{
    Clock, CoordError, CoordinatorConfig, ErrorKind, Event, HolderId, LivenessCheck, Operation,
    Outcome, ProcessLiveness, Semaphore, SemaphoreConfig, SemaphoreInput, SystemClock,
};
use turnstile_storage::{DirStore, MemoryStore, Store};

/// Longest accepted name, in bytes
pub const MAX_NAME_LEN: usize = 255;

/// How [`Registry::open`] treats existing and missing objects
///
/// All flags default to off, as with `std::fs::OpenOptions`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub(crate) create: bool,
    pub(crate) exclusive: bool,
    pub(crate) ephemeral: bool,
    pub(crate) initial: Option<u32>,
    pub(crate) undo: bool,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the object if it does not exist
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Fail with `AlreadyExists` if the object exists (implies `create`)
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        if exclusive {
            self.create = true;
        }
        self
    }

    /// Delete the object when its last handle closes
    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    /// Units available on creation; defaults to the capacity
    pub fn initial(mut self, initial: u32) -> Self {
        self.initial = Some(initial);
        self
    }

    /// Release the handle's outstanding grants when it closes
    pub fn undo(mut self, undo: bool) -> Self {
        self.undo = undo;
        self
    }
}

pub(crate) struct Inner<S, C, L> {
    pub(crate) store: S,
    pub(crate) clock: C,
    pub(crate) liveness: L,
    pub(crate) config: CoordinatorConfig,
}

/// Entry point for opening objects and regions
///
/// Cheap to clone; clones share the store.
pub struct Registry<S: Store, C: Clock = SystemClock, L: LivenessCheck = ProcessLiveness> {
    pub(crate) inner: Arc<Inner<S, C, L>>,
}

impl<S: Store, C: Clock, L: LivenessCheck> Clone for Registry<S, C, L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Registry over a state directory, shared between processes
pub type DirRegistry = Registry<DirStore>;

/// Registry confined to the current process
pub type MemoryRegistry = Registry<MemoryStore>;

impl Registry<DirStore> {
    /// Open the namespace at the configured state directory
    pub fn open_dir(config: CoordinatorConfig) -> Result<Self, CoordError> {
        config
            .validate()
            .map_err(|e| CoordError::invalid("config", Operation::Open, e.to_string()))?;
        let root = config.resolve_state_dir();
        let store = DirStore::open(&root)
            .map_err(|e| e.into_coord(&root.display().to_string(), Operation::Open))?;
        Ok(Self::new(store, SystemClock, ProcessLiveness, config))
    }
}

impl Registry<MemoryStore> {
    pub fn in_memory(config: CoordinatorConfig) -> Self {
        Self::new(MemoryStore::new(), SystemClock, ProcessLiveness, config)
    }
}

/// Check a name is usable as a key in every store
pub(crate) fn validate_name(name: &str, op: Operation) -> Result<(), CoordError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.len() > MAX_NAME_LEN {
        "name is longer than 255 bytes"
    } else if name.contains('\0') {
        "name contains NUL"
    } else if name.contains('/') {
        "name contains '/'"
    } else {
        return Ok(());
    };
    Err(CoordError::invalid(name, op, reason))
}

/// Store the result of a transition, deleting records that are done
pub(crate) fn commit(slot: &mut Option<Semaphore>, next: Semaphore, events: &mut Vec<Event>) {
    if next.is_reclaimable() {
        events.push(Event::ObjectReclaimed {
            name: next.name().to_string(),
        });
        *slot = None;
    } else {
        *slot = Some(next);
    }
}

impl<S: Store, C: Clock, L: LivenessCheck> Registry<S, C, L> {
    pub fn new(store: S, clock: C, liveness: L, config: CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                clock,
                liveness,
                config,
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn clock(&self) -> &C {
        &self.inner.clock
    }

    pub fn liveness(&self) -> &L {
        &self.inner.liveness
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Open `name`, creating it with `capacity` units when allowed
    ///
    /// Attaching to an existing object ignores `capacity`; the handle reports
    /// the object's own capacity.
    pub fn open(
        &self,
        name: &str,
        capacity: u32,
        options: &OpenOptions,
    ) -> Result<ObjectHandle<S, C, L>, CoordError> {
        let op = Operation::Open;
        let _span = tracing::debug_span!("registry.open", name, capacity).entered();
        validate_name(name, op)?;

        let holder = HolderId::current(&HolderId::fresh_handle());
        let clock = &self.inner.clock;
        let (generation, capacity) = self.modify(name, op, |slot, events| {
            let current = match slot.take() {
                Some(existing) => {
                    if options.exclusive {
                        return Err(CoordError::AlreadyExists {
                            name: name.to_string(),
                            op,
                        });
                    }
                    existing
                }
                None if options.create => {
                    if capacity == 0 {
                        return Err(CoordError::invalid(name, op, "capacity must be at least 1"));
                    }
                    let initial = options.initial.unwrap_or(capacity);
                    if initial > capacity {
                        return Err(CoordError::invalid(
                            name,
                            op,
                            format!("initial count {initial} exceeds capacity {capacity}"),
                        ));
                    }
                    let config = SemaphoreConfig::new(name, capacity).with_ephemeral(options.ephemeral);
                    events.push(Event::ObjectCreated {
                        name: name.to_string(),
                        capacity,
                        initial,
                    });
                    Semaphore::new(config, initial, clock)
                }
                None => {
                    return Err(CoordError::NotFound {
                        name: name.to_string(),
                        op,
                    })
                }
            };

            let (next, step) = current
                .transition(
                    SemaphoreInput::Attach {
                        holder: holder.clone(),
                    },
                    clock,
                )
                .map_err(|r| r.at(name, op))?;
            events.extend(step.events);
            let attached = (next.generation.clone(), next.capacity());
            commit(slot, next, events);
            Ok(attached)
        })?;

        Ok(ObjectHandle::new(
            self.clone(),
            name.to_string(),
            holder,
            generation,
            capacity,
            options.undo,
        ))
    }

    /// Mark `name` removed
    ///
    /// Queued acquirers fail with `Removed`; holders may still release, and the
    /// record is deleted once none remain. A corrupted record is purged.
    pub fn destroy(&self, name: &str) -> Result<(), CoordError> {
        let op = Operation::Destroy;
        let _span = tracing::debug_span!("registry.destroy", name).entered();
        validate_name(name, op)?;
        let clock = &self.inner.clock;

        let result = self.modify(name, op, |slot, events| {
            let Some(current) = slot.as_ref() else {
                return Err(CoordError::NotFound {
                    name: name.to_string(),
                    op,
                });
            };
            let (next, step) = current
                .transition(SemaphoreInput::Remove, clock)
                .map_err(|r| r.at(name, op))?;
            events.extend(step.events);
            commit(slot, next, events);
            Ok(())
        });

        match result {
            Err(e) if e.kind() == ErrorKind::Corrupted => {
                tracing::warn!(name, error = %e, "purging corrupted object");
                self.inner
                    .store
                    .purge(name)
                    .map_err(|e| e.into_coord(name, op))?;
                Ok(())
            }
            other => other,
        }
    }

    /// Names of all objects in the namespace
    pub fn names(&self) -> Result<Vec<String>, CoordError> {
        self.inner
            .store
            .names()
            .map_err(|e| e.into_coord("*", Operation::List))
    }

    /// Read a record without changing it
    pub(crate) fn load(&self, name: &str, op: Operation) -> Result<Option<Semaphore>, CoordError> {
        self.inner
            .store
            .update(name, |slot| slot.clone())
            .map_err(|e| e.into_coord(name, op))
    }

    /// Run `f` over the record inside the store's exclusive section
    ///
    /// The record is only written when `f` succeeds; events are logged after
    /// the change is persisted.
    pub(crate) fn modify<T>(
        &self,
        name: &str,
        op: Operation,
        f: impl FnOnce(&mut Option<Semaphore>, &mut Vec<Event>) -> Result<T, CoordError>,
    ) -> Result<T, CoordError> {
        let mut events = Vec::new();
        let result = self
            .inner
            .store
            .update(name, |slot| {
                let mut scratch = slot.clone();
                let result = f(&mut scratch, &mut events);
                if result.is_ok() {
                    *slot = scratch;
                }
                result
            })
            .map_err(|e| e.into_coord(name, op))?;
        if result.is_ok() {
            for event in &events {
                event.log();
            }
        }
        result
    }

    /// Apply a transition to the incarnation `generation` of `name`
    pub(crate) fn apply(
        &self,
        name: &str,
        generation: &str,
        op: Operation,
        input: SemaphoreInput,
    ) -> Result<Outcome, CoordError> {
        let clock = &self.inner.clock;
        self.modify(name, op, |slot, events| {
            let current = match slot.as_ref() {
                Some(current) if current.generation == generation => current,
                // Destroyed, possibly re-created under the same name
                _ => {
                    return Err(CoordError::Removed {
                        name: name.to_string(),
                        op,
                    })
                }
            };
            let (next, step) = current
                .transition(input, clock)
                .map_err(|r| r.at(name, op))?;
            events.extend(step.events);
            commit(slot, next, events);
            Ok(step.outcome)
        })
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
