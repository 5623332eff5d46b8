// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared region manager
//!
//! Regions are fixed-size byte arrays attached by name. Access is unsynchronized;
//! callers bracket reads and writes with coordinator permits.

use crate::registry::{validate_name, Registry};
use turnstile_core::{
    Clock, CoordError, Event, HolderId, LivenessCheck, Operation, RegionInput, RegionRecord,
};
use turnstile_storage::{RegionBytes, RegionStore, Store};

/// Largest region a registry will create (1 GiB)
pub const MAX_REGION_SIZE: u64 = 1 << 30;

/// How [`Registry::open_region_with`] treats existing and missing regions
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionOptions {
    create: bool,
    exclusive: bool,
    ephemeral: bool,
}

impl RegionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Fail with `AlreadyExists` if the region exists (implies `create`)
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        if exclusive {
            self.create = true;
        }
        self
    }

    /// Delete the region when its last handle detaches
    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }
}

/// An attachment to a shared region
pub struct RegionHandle<S: Store, C: Clock, L: LivenessCheck> {
    registry: Registry<S, C, L>,
    name: String,
    holder: HolderId,
    generation: String,
    size: u64,
    bytes: <S as RegionStore>::Bytes,
    detached: bool,
}

impl<S: Store, C: Clock, L: LivenessCheck> std::fmt::Debug for RegionHandle<S, C, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionHandle")
            .field("name", &self.name)
            .field("holder", &self.holder)
            .field("size", &self.size)
            .finish()
    }
}

impl<S: Store, C: Clock, L: LivenessCheck> RegionHandle<S, C, L> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    fn check_bounds(&self, offset: u64, len: usize, op: Operation) -> Result<(), CoordError> {
        let end = u64::try_from(len)
            .ok()
            .and_then(|len| offset.checked_add(len));
        match end {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(CoordError::invalid(
                &self.name,
                op,
                format!(
                    "range {offset}+{len} outside region of {} bytes",
                    self.size
                ),
            )),
        }
    }

    /// Fill `buf` from the region starting at `offset`
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), CoordError> {
        let op = Operation::RegionRead;
        self.check_bounds(offset, buf.len(), op)?;
        self.bytes
            .read_at(offset, buf)
            .map_err(|e| CoordError::from_io(&self.name, op, e))
    }

    /// Copy `data` into the region starting at `offset`
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), CoordError> {
        let op = Operation::RegionWrite;
        self.check_bounds(offset, data.len(), op)?;
        self.bytes
            .write_at(offset, data)
            .map_err(|e| CoordError::from_io(&self.name, op, e))
    }

    /// Number of handles attached to this incarnation
    pub fn attachments(&self) -> Result<usize, CoordError> {
        let op = Operation::Status;
        self.registry
            .store()
            .update_region(&self.name, |slot| {
                slot.as_ref()
                    .filter(|r| r.generation == self.generation)
                    .map(RegionRecord::attach_count)
            })
            .map_err(|e| e.into_coord(&self.name, op))?
            .ok_or_else(|| CoordError::Removed {
                name: self.name.clone(),
                op,
            })
    }

    pub fn detach(mut self) -> Result<(), CoordError> {
        self.detached = true;
        self.detach_inner()
    }

    fn detach_inner(&self) -> Result<(), CoordError> {
        self.registry
            .detach_region(&self.name, &self.holder, &self.generation)
    }
}

impl<S: Store, C: Clock, L: LivenessCheck> Drop for RegionHandle<S, C, L> {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Err(e) = self.detach_inner() {
            tracing::warn!(name = %self.name, error = %e, "failed to detach region");
        }
    }
}

impl<S: Store, C: Clock, L: LivenessCheck> Registry<S, C, L> {
    /// Remove `holder` from one incarnation of a region
    fn detach_region(
        &self,
        name: &str,
        holder: &HolderId,
        generation: &str,
    ) -> Result<(), CoordError> {
        let op = Operation::RegionDetach;
        let clock = self.clock();
        let mut events = Vec::new();
        self.store()
            .update_region(name, |slot| {
                let Some(current) = slot.as_ref().filter(|r| r.generation == generation) else {
                    // Destroyed while attached
                    return;
                };
                let input = RegionInput::Detach {
                    holder: holder.clone(),
                };
                if let Ok((next, detached)) = current.transition(input, clock) {
                    events = detached;
                    *slot = (!next.is_reclaimable()).then_some(next);
                }
            })
            .map_err(|e| e.into_coord(name, op))?;
        for event in &events {
            event.log();
        }
        Ok(())
    }

    /// Create a region, failing if it exists
    pub fn create_region(&self, name: &str, size: u64) -> Result<RegionHandle<S, C, L>, CoordError> {
        self.open_region_with(name, size, &RegionOptions::new().exclusive(true))
    }

    /// Attach to an existing region
    pub fn attach_region(&self, name: &str) -> Result<RegionHandle<S, C, L>, CoordError> {
        self.open_region_with(name, 0, &RegionOptions::new())
    }

    /// Create or attach; an existing region must have the requested size
    pub fn open_region(&self, name: &str, size: u64) -> Result<RegionHandle<S, C, L>, CoordError> {
        self.open_region_with(name, size, &RegionOptions::new().create(true))
    }

    pub fn open_region_with(
        &self,
        name: &str,
        size: u64,
        options: &RegionOptions,
    ) -> Result<RegionHandle<S, C, L>, CoordError> {
        let op = if options.create {
            Operation::RegionCreate
        } else {
            Operation::RegionAttach
        };
        let _span = tracing::debug_span!("region.open", name, size).entered();
        validate_name(name, op)?;
        let fits = size > 0 && size <= MAX_REGION_SIZE && usize::try_from(size).is_ok();
        if options.create && !fits {
            return Err(CoordError::invalid(
                name,
                op,
                format!("size {size} outside 1..={MAX_REGION_SIZE}"),
            ));
        }

        let holder = HolderId::current(&HolderId::fresh_handle());
        let clock = self.clock();
        let mut events = Vec::new();
        let record = self
            .store()
            .update_region(name, |slot| {
                let current = match slot.as_ref() {
                    Some(_) if options.exclusive => {
                        return Err(CoordError::AlreadyExists {
                            name: name.to_string(),
                            op,
                        })
                    }
                    Some(existing) if options.create && existing.size != size => {
                        return Err(CoordError::invalid(
                            name,
                            op,
                            format!("existing region has {} bytes, not {size}", existing.size),
                        ))
                    }
                    Some(existing) => existing.clone(),
                    None if options.create => {
                        events.push(Event::RegionCreated {
                            name: name.to_string(),
                            size,
                        });
                        RegionRecord::new(name, size, options.ephemeral, clock)
                    }
                    None => {
                        return Err(CoordError::NotFound {
                            name: name.to_string(),
                            op,
                        })
                    }
                };
                let (next, attached) = current
                    .transition(
                        RegionInput::Attach {
                            holder: holder.clone(),
                        },
                        clock,
                    )
                    .map_err(|r| r.at(name, op))?;
                events.extend(attached);
                *slot = Some(next.clone());
                Ok(next)
            })
            .map_err(|e| e.into_coord(name, op))??;
        for event in &events {
            event.log();
        }

        let bytes = match self.store().region_bytes(&record) {
            Ok(bytes) => bytes,
            Err(e) => {
                // The attachment already committed
                if let Err(detach) = self.detach_region(name, &holder, &record.generation) {
                    tracing::warn!(name, error = %detach, "failed to detach region");
                }
                return Err(e.into_coord(name, op));
            }
        };
        Ok(RegionHandle {
            registry: self.clone(),
            name: name.to_string(),
            holder,
            generation: record.generation,
            size: record.size,
            bytes,
            detached: false,
        })
    }

    /// Delete a region
    ///
    /// Handles attached before the call keep working on the old bytes. A
    /// corrupted record is purged.
    pub fn destroy_region(&self, name: &str) -> Result<(), CoordError> {
        let op = Operation::RegionDestroy;
        let _span = tracing::debug_span!("region.destroy", name).entered();
        validate_name(name, op)?;
        let clock = self.clock();
        let mut events = Vec::new();

        let result = self.store().update_region(name, |slot| {
            let Some(current) = slot.as_ref() else {
                return Err(CoordError::NotFound {
                    name: name.to_string(),
                    op,
                });
            };
            let (next, removed) = current
                .transition(RegionInput::Remove, clock)
                .map_err(|r| r.at(name, op))?;
            events = removed;
            *slot = (!next.is_reclaimable()).then_some(next);
            Ok(())
        });

        match result {
            Ok(outcome) => {
                outcome?;
                for event in &events {
                    event.log();
                }
                Ok(())
            }
            Err(e) if e.is_corrupted() => {
                tracing::warn!(name, error = %e, "purging corrupted region");
                self.store()
                    .purge_region(name)
                    .map_err(|e| e.into_coord(name, op))?;
                Ok(())
            }
            Err(e) => Err(e.into_coord(name, op)),
        }
    }

    pub fn region_names(&self) -> Result<Vec<String>, CoordError> {
        self.store()
            .region_names()
            .map_err(|e| e.into_coord("*", Operation::List))
    }
}

#[cfg(test)]
#[path = "region_tests.rs"]
mod tests;
