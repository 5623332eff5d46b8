// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk record envelope with checksum verification
//!
//! ```json
//! { "version": 1, "checksum": 2768625435, "state": { ... } }
//! ```
//!
//! The checksum is the CRC32 of the compact JSON of `state`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use turnstile_core::{RegionRecord, Semaphore};

pub const RECORD_VERSION: u32 = 1;

/// State that can be persisted by a store
pub trait StoredRecord: Serialize + DeserializeOwned + Clone + PartialEq {
    /// Name the record was stored under
    fn record_name(&self) -> &str;
    /// Structural checks run after decoding
    fn verify(&self) -> Result<(), String>;
}

impl StoredRecord for Semaphore {
    fn record_name(&self) -> &str {
        self.name()
    }

    fn verify(&self) -> Result<(), String> {
        Semaphore::verify(self)
    }
}

impl StoredRecord for RegionRecord {
    fn record_name(&self) -> &str {
        &self.name
    }

    fn verify(&self) -> Result<(), String> {
        RegionRecord::verify(self)
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    checksum: u32,
    state: serde_json::Value,
}

fn checksum(state: &serde_json::Value) -> Result<u32, serde_json::Error> {
    let json = serde_json::to_string(state)?;
    Ok(crc32fast::hash(json.as_bytes()))
}

pub fn encode<T: StoredRecord>(state: &T) -> Result<Vec<u8>, serde_json::Error> {
    let state = serde_json::to_value(state)?;
    let envelope = Envelope {
        version: RECORD_VERSION,
        checksum: checksum(&state)?,
        state,
    };
    serde_json::to_vec_pretty(&envelope)
}

/// Decode and verify a record stored under `name`
///
/// The error is a human-readable reason.
pub fn decode<T: StoredRecord>(bytes: &[u8], name: &str) -> Result<T, String> {
    let envelope: Envelope =
        serde_json::from_slice(bytes).map_err(|e| format!("unparsable record: {e}"))?;
    if envelope.version != RECORD_VERSION {
        return Err(format!("unsupported version {}", envelope.version));
    }
    let expected = checksum(&envelope.state).map_err(|e| e.to_string())?;
    if expected != envelope.checksum {
        return Err(format!(
            "checksum mismatch: stored {:08x}, computed {expected:08x}",
            envelope.checksum
        ));
    }
    let state: T =
        serde_json::from_value(envelope.state).map_err(|e| format!("invalid state: {e}"))?;
    if state.record_name() != name {
        return Err(format!(
            "record belongs to {:?}, expected {name:?}",
            state.record_name()
        ));
    }
    state.verify()?;
    Ok(state)
}

/// Name stored in a record, skipping verification
pub(crate) fn peek_name<T: StoredRecord>(bytes: &[u8]) -> Option<String> {
    let envelope: Envelope = serde_json::from_slice(bytes).ok()?;
    let state: T = serde_json::from_value(envelope.state).ok()?;
    Some(state.record_name().to_string())
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
