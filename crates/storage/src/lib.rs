// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! turnstile-storage: where coordination state lives
//!
//! Every mutation runs a caller-supplied closure over the current record
//! inside an exclusive section. [`MemoryStore`] serves the threads of one
//! process; [`DirStore`] serves many processes sharing a state directory.

mod dir;
mod error;
mod memory;
mod notify;
mod record;

pub use dir::{DirStore, FileRegion};
pub use error::StoreError;
pub use memory::{MemoryRegion, MemoryStore};
pub use notify::Notifier;
pub use record::{decode, encode, StoredRecord, RECORD_VERSION};

use std::io;
use turnstile_core::{RegionRecord, Semaphore};

/// Storage for named semaphores
pub trait ObjectStore: Clone + Send + Sync + 'static {
    /// Run `f` over the record for `name` inside the store's exclusive
    /// section, persisting the slot if `f` changed it.
    ///
    /// Setting the slot to `None` deletes the record. A record that fails to
    /// decode is reported as [`StoreError::Corrupted`] and `f` is not run.
    fn update<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Option<Semaphore>) -> R,
    ) -> Result<R, StoreError>;

    /// Delete the record regardless of its contents
    fn purge(&self, name: &str) -> Result<bool, StoreError>;

    /// Names of all readable records
    fn names(&self) -> Result<Vec<String>, StoreError>;

    /// Change notifier shared by objects and regions of this store
    fn notifier(&self) -> &Notifier;
}

/// Storage for shared region records and their bytes
pub trait RegionStore: Clone + Send + Sync + 'static {
    type Bytes: RegionBytes;

    /// Like [`ObjectStore::update`]; backing bytes are created when a record
    /// appears and deleted when it disappears.
    fn update_region<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Option<RegionRecord>) -> R,
    ) -> Result<R, StoreError>;

    /// Open the bytes of a region incarnation
    fn region_bytes(&self, record: &RegionRecord) -> Result<Self::Bytes, StoreError>;

    /// Delete the record and any backing bytes regardless of contents
    fn purge_region(&self, name: &str) -> Result<bool, StoreError>;

    fn region_names(&self) -> Result<Vec<String>, StoreError>;
}

/// Positional access to region bytes
///
/// Callers check bounds; implementations fail on short reads.
pub trait RegionBytes: Send + Sync + 'static {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()>;
}

/// Both halves of a backend, as required by the engine
pub trait Store: ObjectStore + RegionStore {}

impl<T: ObjectStore + RegionStore> Store for T {}
