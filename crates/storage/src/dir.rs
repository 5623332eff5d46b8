// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-backed store shared by many processes
//!
//! Layout under the root:
//!
//! ```text
//! objects/<key>.lock     permanent, flock'ed around every update
//! objects/<key>.json     record, replaced by rename
//! regions/<key>.lock
//! regions/<key>.json
//! regions/<key>-<generation>.data
//! ```
//!
//! `<key>` is the hex of the first 16 bytes of SHA-256 of the name. Lock files
//! are never deleted, so every process locking a key locks the same inode.

use crate::record::{self, StoredRecord};
use crate::{Notifier, ObjectStore, RegionBytes, RegionStore, StoreError};
use fs2::FileExt as _;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::FileExt as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use turnstile_core::{RegionRecord, Semaphore};

const OBJECTS: &str = "objects";
const REGIONS: &str = "regions";

/// Store rooted at a state directory
///
/// Clones share the in-process notifier. Separate `DirStore`s opened on the
/// same directory, in this process or another, observe each other's changes
/// only by re-reading.
#[derive(Clone, Debug)]
pub struct DirStore {
    root: PathBuf,
    notifier: Arc<Notifier>,
}

/// Hex of the first 16 bytes of SHA-256 of `name`
pub(crate) fn file_key(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest[..16])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Exclusive lock on a key, released on drop
struct KeyLock {
    _file: File,
}

impl KeyLock {
    fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

impl DirStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(OBJECTS))?;
        fs::create_dir_all(root.join(REGIONS))?;
        tracing::debug!(root = %root.display(), "opened state directory");
        Ok(Self {
            root,
            notifier: Arc::new(Notifier::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for an object
    pub fn object_path(&self, name: &str) -> PathBuf {
        self.root
            .join(OBJECTS)
            .join(format!("{}.json", file_key(name)))
    }

    /// Path of the record for a region
    pub fn region_path(&self, name: &str) -> PathBuf {
        self.root
            .join(REGIONS)
            .join(format!("{}.json", file_key(name)))
    }

    fn data_path(&self, record: &RegionRecord) -> PathBuf {
        self.root.join(REGIONS).join(format!(
            "{}-{}.data",
            file_key(&record.name),
            record.generation
        ))
    }

    fn lock_key(&self, kind: &str, name: &str) -> io::Result<KeyLock> {
        KeyLock::acquire(
            &self
                .root
                .join(kind)
                .join(format!("{}.lock", file_key(name))),
        )
    }

    /// Run `f` under the key lock, persisting the slot if it changed
    fn locked_update<T: StoredRecord, R>(
        &self,
        kind: &str,
        name: &str,
        f: impl FnOnce(&mut Option<T>) -> R,
        on_change: impl FnOnce(&Option<T>, &Option<T>) -> Result<(), StoreError>,
    ) -> Result<R, StoreError> {
        let changed;
        let result = {
            let _lock = self.lock_key(kind, name)?;
            let path = self
                .root
                .join(kind)
                .join(format!("{}.json", file_key(name)));
            let before: Option<T> = read_record(&path, name)?;
            let mut slot = before.clone();
            let result = f(&mut slot);
            changed = slot != before;
            if changed {
                on_change(&before, &slot)?;
                match &slot {
                    Some(state) => write_atomic(&path, &record::encode(state)?)?,
                    None => {
                        remove_if_exists(&path)?;
                    }
                }
            }
            result
        };
        if changed {
            self.notifier.bump();
        }
        Ok(result)
    }

    fn purge_key(&self, kind: &str, name: &str) -> Result<bool, StoreError> {
        let _lock = self.lock_key(kind, name)?;
        let key = file_key(name);
        let dir = self.root.join(kind);
        let removed = remove_if_exists(&dir.join(format!("{key}.json")))?;
        if kind == REGIONS {
            let prefix = format!("{key}-");
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let file_name = entry.file_name();
                let file_name = file_name.to_string_lossy();
                if file_name.starts_with(&prefix) && file_name.ends_with(".data") {
                    remove_if_exists(&entry.path())?;
                }
            }
        }
        if removed {
            tracing::warn!(name, kind, "purged record");
            self.notifier.bump();
        }
        Ok(removed)
    }

    fn list<T: StoredRecord>(&self, kind: &str) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.root.join(kind))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                // Deleted between listing and reading
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match record::peek_name::<T>(&bytes) {
                Some(name) => names.push(name),
                None => tracing::warn!(path = %path.display(), "skipping unreadable record"),
            }
        }
        names.sort();
        Ok(names)
    }
}

fn read_record<T: StoredRecord>(path: &Path, name: &str) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    record::decode(&bytes, name)
        .map(Some)
        .map_err(|reason| StoreError::Corrupted {
            path: path.to_path_buf(),
            reason,
        })
}

/// Write to a sibling temp file and rename over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

impl ObjectStore for DirStore {
    fn update<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Option<Semaphore>) -> R,
    ) -> Result<R, StoreError> {
        self.locked_update(OBJECTS, name, f, |_, _| Ok(()))
    }

    fn purge(&self, name: &str) -> Result<bool, StoreError> {
        self.purge_key(OBJECTS, name)
    }

    fn names(&self) -> Result<Vec<String>, StoreError> {
        self.list::<Semaphore>(OBJECTS)
    }

    fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

impl RegionStore for DirStore {
    type Bytes = FileRegion;

    fn update_region<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Option<RegionRecord>) -> R,
    ) -> Result<R, StoreError> {
        self.locked_update(REGIONS, name, f, |before, after| {
            let before_gen = before.as_ref().map(|r| &r.generation);
            let after_gen = after.as_ref().map(|r| &r.generation);
            if before_gen == after_gen {
                return Ok(());
            }
            if let Some(old) = before {
                remove_if_exists(&self.data_path(old))?;
            }
            if let Some(new) = after {
                let file = OpenOptions::new()
                    .create_new(true)
                    .read(true)
                    .write(true)
                    .open(self.data_path(new))?;
                file.set_len(new.size)?;
            }
            Ok(())
        })
    }

    fn region_bytes(&self, record: &RegionRecord) -> Result<FileRegion, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.data_path(record))?;
        Ok(FileRegion { file })
    }

    fn purge_region(&self, name: &str) -> Result<bool, StoreError> {
        self.purge_key(REGIONS, name)
    }

    fn region_names(&self) -> Result<Vec<String>, StoreError> {
        self.list::<RegionRecord>(REGIONS)
    }
}

/// Region bytes in a data file, accessed with positional IO
#[derive(Debug)]
pub struct FileRegion {
    file: File,
}

impl RegionBytes for FileRegion {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.read_exact_at(buf, offset)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.write_all_at(data, offset)
    }
}

#[cfg(test)]
#[path = "dir_tests.rs"]
mod tests;
