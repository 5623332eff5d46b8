// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process store for threads sharing one registry

use crate::{Notifier, ObjectStore, RegionBytes, RegionStore, StoreError};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use turnstile_core::{RegionRecord, Semaphore};

#[derive(Default)]
struct Inner {
    objects: Mutex<HashMap<String, Semaphore>>,
    regions: Mutex<HashMap<String, RegionRecord>>,
    /// Region bytes keyed by generation
    buffers: Mutex<HashMap<String, Arc<Mutex<Vec<u8>>>>>,
    notifier: Notifier,
}

/// Store backed by process memory
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("objects", &lock(&self.inner.objects).len())
            .field("regions", &lock(&self.inner.regions).len())
            .finish()
    }
}

impl ObjectStore for MemoryStore {
    fn update<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Option<Semaphore>) -> R,
    ) -> Result<R, StoreError> {
        let (result, changed) = {
            let mut objects = lock(&self.inner.objects);
            let before = objects.get(name).cloned();
            let mut slot = before.clone();
            let result = f(&mut slot);
            let changed = slot != before;
            match slot {
                Some(state) if changed => {
                    objects.insert(name.to_string(), state);
                }
                None if changed => {
                    objects.remove(name);
                }
                _ => {}
            }
            (result, changed)
        };
        if changed {
            self.inner.notifier.bump();
        }
        Ok(result)
    }

    fn purge(&self, name: &str) -> Result<bool, StoreError> {
        let removed = lock(&self.inner.objects).remove(name).is_some();
        if removed {
            self.inner.notifier.bump();
        }
        Ok(removed)
    }

    fn names(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = lock(&self.inner.objects).keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}

impl RegionStore for MemoryStore {
    type Bytes = MemoryRegion;

    fn update_region<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Option<RegionRecord>) -> R,
    ) -> Result<R, StoreError> {
        let (result, changed) = {
            let mut regions = lock(&self.inner.regions);
            let before = regions.get(name).cloned();
            let mut slot = before.clone();
            let result = f(&mut slot);
            let changed = slot != before;
            if changed {
                let mut buffers = lock(&self.inner.buffers);
                if let Some(record) = &slot {
                    if !buffers.contains_key(&record.generation) {
                        let bytes = zeroed(record)?;
                        buffers.insert(record.generation.clone(), Arc::new(Mutex::new(bytes)));
                    }
                }
                if let Some(old) = &before {
                    if slot.as_ref().map(|r| &r.generation) != Some(&old.generation) {
                        buffers.remove(&old.generation);
                    }
                }
                match slot {
                    Some(record) => {
                        regions.insert(name.to_string(), record);
                    }
                    None => {
                        regions.remove(name);
                    }
                }
            }
            (result, changed)
        };
        if changed {
            self.inner.notifier.bump();
        }
        Ok(result)
    }

    fn region_bytes(&self, record: &RegionRecord) -> Result<MemoryRegion, StoreError> {
        lock(&self.inner.buffers)
            .get(&record.generation)
            .cloned()
            .map(|bytes| MemoryRegion { bytes })
            .ok_or_else(|| {
                StoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no bytes for region {}", record.name),
                ))
            })
    }

    fn purge_region(&self, name: &str) -> Result<bool, StoreError> {
        let removed = lock(&self.inner.regions).remove(name);
        if let Some(record) = &removed {
            lock(&self.inner.buffers).remove(&record.generation);
            self.inner.notifier.bump();
        }
        Ok(removed.is_some())
    }

    fn region_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = lock(&self.inner.regions).keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Allocate the bytes of a new incarnation without aborting on huge sizes
fn zeroed(record: &RegionRecord) -> Result<Vec<u8>, StoreError> {
    let too_large = || {
        StoreError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("region {} of {} bytes cannot be allocated", record.name, record.size),
        ))
    };
    let len = usize::try_from(record.size).map_err(|_| too_large())?;
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(len).map_err(|_| too_large())?;
    bytes.resize(len, 0);
    Ok(bytes)
}

/// Region bytes shared by every handle of one incarnation
#[derive(Clone, Debug)]
pub struct MemoryRegion {
    bytes: Arc<Mutex<Vec<u8>>>,
}

fn out_of_range() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "access past end of region")
}

impl RegionBytes for MemoryRegion {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let bytes = lock(&self.bytes);
        let start = usize::try_from(offset).map_err(|_| out_of_range())?;
        let src = start
            .checked_add(buf.len())
            .and_then(|end| bytes.get(start..end))
            .ok_or_else(out_of_range)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        let mut bytes = lock(&self.bytes);
        let start = usize::try_from(offset).map_err(|_| out_of_range())?;
        let dst = start
            .checked_add(data.len())
            .and_then(|end| bytes.get_mut(start..end))
            .ok_or_else(out_of_range)?;
        dst.copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
