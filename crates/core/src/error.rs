// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for coordination operations
//!
//! Every [`CoordError`] carries the object name and the attempted
//! [`Operation`]. State machines report [`Refusal`]s, which carry neither;
//! the caller attaches context with [`Refusal::at`].

use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Operation that was attempted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Close,
    Destroy,
    List,
    Acquire,
    TryAcquire,
    Release,
    Disown,
    Heartbeat,
    Status,
    Sweep,
    Pass,
    RegionCreate,
    RegionAttach,
    RegionDetach,
    RegionDestroy,
    RegionRead,
    RegionWrite,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Close => "close",
            Operation::Destroy => "destroy",
            Operation::List => "list",
            Operation::Acquire => "acquire",
            Operation::TryAcquire => "try_acquire",
            Operation::Release => "release",
            Operation::Disown => "disown",
            Operation::Heartbeat => "heartbeat",
            Operation::Status => "status",
            Operation::Sweep => "sweep",
            Operation::Pass => "pass",
            Operation::RegionCreate => "region.create",
            Operation::RegionAttach => "region.attach",
            Operation::RegionDetach => "region.detach",
            Operation::RegionDestroy => "region.destroy",
            Operation::RegionRead => "region.read",
            Operation::RegionWrite => "region.write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of [`CoordError`] for branching
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    Removed,
    Timeout,
    Cancelled,
    Overrelease,
    NotHeld,
    PermissionDenied,
    Corrupted,
    InvalidArgument,
    Io,
}

/// Errors returned by registry, coordinator, region and handoff operations
#[derive(Debug, Error)]
pub enum CoordError {
    #[error("{op} {name}: already exists")]
    AlreadyExists { name: String, op: Operation },

    #[error("{op} {name}: not found")]
    NotFound { name: String, op: Operation },

    #[error("{op} {name}: object was removed")]
    Removed { name: String, op: Operation },

    #[error("{op} {name}: timed out after {waited:?}")]
    Timeout {
        name: String,
        op: Operation,
        waited: Duration,
    },

    #[error("{op} {name}: cancelled")]
    Cancelled { name: String, op: Operation },

    #[error("{op} {name}: releasing {requested} exceeds the {releasable} releasable units")]
    Overrelease {
        name: String,
        op: Operation,
        requested: u32,
        releasable: u32,
    },

    #[error("{op} {name}: handle holds {held} units, {requested} required")]
    NotHeld {
        name: String,
        op: Operation,
        requested: u32,
        held: u32,
    },

    #[error("{op} {name}: permission denied")]
    PermissionDenied {
        name: String,
        op: Operation,
        #[source]
        source: io::Error,
    },

    #[error("{op} {name}: corrupted: {reason}")]
    Corrupted {
        name: String,
        op: Operation,
        reason: String,
    },

    #[error("{op} {name}: invalid argument: {reason}")]
    InvalidArgument {
        name: String,
        op: Operation,
        reason: String,
    },

    #[error("{op} {name}: IO error: {source}")]
    Io {
        name: String,
        op: Operation,
        #[source]
        source: io::Error,
    },
}

impl CoordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoordError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            CoordError::NotFound { .. } => ErrorKind::NotFound,
            CoordError::Removed { .. } => ErrorKind::Removed,
            CoordError::Timeout { .. } => ErrorKind::Timeout,
            CoordError::Cancelled { .. } => ErrorKind::Cancelled,
            CoordError::Overrelease { .. } => ErrorKind::Overrelease,
            CoordError::NotHeld { .. } => ErrorKind::NotHeld,
            CoordError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            CoordError::Corrupted { .. } => ErrorKind::Corrupted,
            CoordError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            CoordError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Name of the object or region involved
    pub fn name(&self) -> &str {
        match self {
            CoordError::AlreadyExists { name, .. }
            | CoordError::NotFound { name, .. }
            | CoordError::Removed { name, .. }
            | CoordError::Timeout { name, .. }
            | CoordError::Cancelled { name, .. }
            | CoordError::Overrelease { name, .. }
            | CoordError::NotHeld { name, .. }
            | CoordError::PermissionDenied { name, .. }
            | CoordError::Corrupted { name, .. }
            | CoordError::InvalidArgument { name, .. }
            | CoordError::Io { name, .. } => name,
        }
    }

    pub fn op(&self) -> Operation {
        match self {
            CoordError::AlreadyExists { op, .. }
            | CoordError::NotFound { op, .. }
            | CoordError::Removed { op, .. }
            | CoordError::Timeout { op, .. }
            | CoordError::Cancelled { op, .. }
            | CoordError::Overrelease { op, .. }
            | CoordError::NotHeld { op, .. }
            | CoordError::PermissionDenied { op, .. }
            | CoordError::Corrupted { op, .. }
            | CoordError::InvalidArgument { op, .. }
            | CoordError::Io { op, .. } => *op,
        }
    }

    pub fn invalid(name: &str, op: Operation, reason: impl Into<String>) -> Self {
        CoordError::InvalidArgument {
            name: name.to_string(),
            op,
            reason: reason.into(),
        }
    }

    /// Classify an IO error, surfacing permission problems separately
    pub fn from_io(name: &str, op: Operation, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            CoordError::PermissionDenied {
                name: name.to_string(),
                op,
                source,
            }
        } else {
            CoordError::Io {
                name: name.to_string(),
                op,
                source,
            }
        }
    }
}

/// A transition rejected by a coordination state machine
///
/// The state is left unchanged whenever a refusal is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Refusal {
    /// The object has been destroyed or replaced
    Removed,
    /// Weight outside `1..=capacity`
    InvalidWeight { weight: u32, capacity: u32 },
    /// Release not covered by the caller's grants plus unowned units
    Overrelease { requested: u32, releasable: u32 },
    /// The caller's handle does not hold enough units
    NotHeld { requested: u32, held: u32 },
    /// The ticket is neither queued nor granted
    UnknownTicket(u64),
}

impl Refusal {
    /// Attach object name and operation
    pub fn at(self, name: &str, op: Operation) -> CoordError {
        let name = name.to_string();
        match self {
            Refusal::Removed | Refusal::UnknownTicket(_) => CoordError::Removed { name, op },
            Refusal::InvalidWeight { weight, capacity } => CoordError::InvalidArgument {
                name,
                op,
                reason: format!("weight {weight} outside 1..={capacity}"),
            },
            Refusal::Overrelease {
                requested,
                releasable,
            } => CoordError::Overrelease {
                name,
                op,
                requested,
                releasable,
            },
            Refusal::NotHeld { requested, held } => CoordError::NotHeld {
                name,
                op,
                requested,
                held,
            },
        }
    }
}
