// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use turnstile_core::{CoordError, Operation};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupted record {}: {reason}", path.display())]
    Corrupted { path: PathBuf, reason: String },
}

impl StoreError {
    pub fn is_corrupted(&self) -> bool {
        matches!(self, StoreError::Corrupted { .. })
    }

    /// Attach the object name and operation at the engine boundary
    pub fn into_coord(self, name: &str, op: Operation) -> CoordError {
        match self {
            StoreError::Io(source) => CoordError::from_io(name, op, source),
            StoreError::Json(e) => CoordError::Corrupted {
                name: name.to_string(),
                op,
                reason: e.to_string(),
            },
            StoreError::Corrupted { reason, .. } => CoordError::Corrupted {
                name: name.to_string(),
                op,
                reason,
            },
        }
    }
}
