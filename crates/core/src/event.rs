// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events produced by coordination state transitions
//!
//! State machines return events instead of logging; the engine forwards them
//! to `tracing` with [`Event::log`].

use crate::coordination::HolderId;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    // Object lifecycle
    ObjectCreated {
        name: String,
        capacity: u32,
        initial: u32,
    },
    ObjectAttached {
        name: String,
        holder: HolderId,
        attachments: usize,
    },
    ObjectDetached {
        name: String,
        holder: HolderId,
        attachments: usize,
    },
    ObjectRemoved {
        name: String,
        holders: usize,
        dropped_waiters: usize,
    },
    /// Record deleted (drained after removal, or last ephemeral detach)
    ObjectReclaimed { name: String },

    // Permits
    PermitAcquired {
        name: String,
        holder: HolderId,
        grant: u64,
        weight: u32,
        available: u32,
    },
    PermitQueued {
        name: String,
        holder: HolderId,
        ticket: u64,
        weight: u32,
        position: usize,
    },
    /// A queued acquirer was granted by a release
    PermitGranted {
        name: String,
        holder: HolderId,
        ticket: u64,
        weight: u32,
        available: u32,
    },
    PermitDenied {
        name: String,
        holder: HolderId,
        requested: u32,
        available: u32,
    },
    PermitReleased {
        name: String,
        holder: HolderId,
        weight: u32,
        available: u32,
    },
    PermitDisowned {
        name: String,
        holder: HolderId,
        weight: u32,
    },
    /// A queued acquirer gave up (timeout or cancellation)
    PermitAbandoned {
        name: String,
        holder: HolderId,
        ticket: u64,
    },

    // Recovery
    RecoveredStaleHolder {
        name: String,
        holder: HolderId,
        grant: u64,
        weight: u32,
        held_for: Duration,
    },
    PurgedDeadWaiter {
        name: String,
        holder: HolderId,
        ticket: u64,
    },
    PurgedDeadAttachment { name: String, holder: HolderId },

    // Regions
    RegionCreated { name: String, size: u64 },
    RegionAttached {
        name: String,
        holder: HolderId,
        attachments: usize,
    },
    RegionDetached {
        name: String,
        holder: HolderId,
        attachments: usize,
    },
    RegionRemoved { name: String, attachments: usize },
}

impl Event {
    /// Stable event name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::ObjectCreated { .. } => "object:created",
            Event::ObjectAttached { .. } => "object:attached",
            Event::ObjectDetached { .. } => "object:detached",
            Event::ObjectRemoved { .. } => "object:removed",
            Event::ObjectReclaimed { .. } => "object:reclaimed",
            Event::PermitAcquired { .. } => "permit:acquired",
            Event::PermitQueued { .. } => "permit:queued",
            Event::PermitGranted { .. } => "permit:granted",
            Event::PermitDenied { .. } => "permit:denied",
            Event::PermitReleased { .. } => "permit:released",
            Event::PermitDisowned { .. } => "permit:disowned",
            Event::PermitAbandoned { .. } => "permit:abandoned",
            Event::RecoveredStaleHolder { .. } => "recovery:stale-holder",
            Event::PurgedDeadWaiter { .. } => "recovery:dead-waiter",
            Event::PurgedDeadAttachment { .. } => "recovery:dead-attachment",
            Event::RegionCreated { .. } => "region:created",
            Event::RegionAttached { .. } => "region:attached",
            Event::RegionDetached { .. } => "region:detached",
            Event::RegionRemoved { .. } => "region:removed",
        }
    }

    /// Name of the object or region the event concerns
    pub fn subject(&self) -> &str {
        match self {
            Event::ObjectCreated { name, .. }
            | Event::ObjectAttached { name, .. }
            | Event::ObjectDetached { name, .. }
            | Event::ObjectRemoved { name, .. }
            | Event::ObjectReclaimed { name }
            | Event::PermitAcquired { name, .. }
            | Event::PermitQueued { name, .. }
            | Event::PermitGranted { name, .. }
            | Event::PermitDenied { name, .. }
            | Event::PermitReleased { name, .. }
            | Event::PermitDisowned { name, .. }
            | Event::PermitAbandoned { name, .. }
            | Event::RecoveredStaleHolder { name, .. }
            | Event::PurgedDeadWaiter { name, .. }
            | Event::PurgedDeadAttachment { name, .. }
            | Event::RegionCreated { name, .. }
            | Event::RegionAttached { name, .. }
            | Event::RegionDetached { name, .. }
            | Event::RegionRemoved { name, .. } => name,
        }
    }

    pub fn is_recovery(&self) -> bool {
        matches!(
            self,
            Event::RecoveredStaleHolder { .. }
                | Event::PurgedDeadWaiter { .. }
                | Event::PurgedDeadAttachment { .. }
        )
    }

    /// Forward the event to `tracing`
    pub fn log(&self) {
        let event = self.name();
        match self {
            Event::ObjectCreated {
                name,
                capacity,
                initial,
            } => tracing::info!(event, name = %name, capacity, initial, "object created"),
            Event::ObjectAttached {
                name,
                holder,
                attachments,
            } => tracing::debug!(event, name = %name, %holder, attachments, "object attached"),
            Event::ObjectDetached {
                name,
                holder,
                attachments,
            } => tracing::debug!(event, name = %name, %holder, attachments, "object detached"),
            Event::ObjectRemoved {
                name,
                holders,
                dropped_waiters,
            } => tracing::info!(event, name = %name, holders, dropped_waiters, "object removed"),
            Event::ObjectReclaimed { name } => tracing::info!(event, name = %name, "object reclaimed"),
            Event::PermitAcquired {
                name,
                holder,
                grant,
                weight,
                available,
            } => tracing::debug!(event, name = %name, %holder, grant, weight, available, "permit acquired"),
            Event::PermitQueued {
                name,
                holder,
                ticket,
                weight,
                position,
            } => tracing::debug!(event, name = %name, %holder, ticket, weight, position, "permit queued"),
            Event::PermitGranted {
                name,
                holder,
                ticket,
                weight,
                available,
            } => tracing::debug!(event, name = %name, %holder, ticket, weight, available, "permit granted"),
            Event::PermitDenied {
                name,
                holder,
                requested,
                available,
            } => tracing::trace!(event, name = %name, %holder, requested, available, "permit denied"),
            Event::PermitReleased {
                name,
                holder,
                weight,
                available,
            } => tracing::debug!(event, name = %name, %holder, weight, available, "permit released"),
            Event::PermitDisowned {
                name,
                holder,
                weight,
            } => tracing::debug!(event, name = %name, %holder, weight, "permit disowned"),
            Event::PermitAbandoned {
                name,
                holder,
                ticket,
            } => tracing::debug!(event, name = %name, %holder, ticket, "queued acquire abandoned"),
            Event::RecoveredStaleHolder {
                name,
                holder,
                grant,
                weight,
                held_for,
            } => tracing::warn!(
                event,
                name = %name,
                %holder,
                grant,
                weight,
                held_ms = held_for.as_millis() as u64,
                "recovered stale holder"
            ),
            Event::PurgedDeadWaiter {
                name,
                holder,
                ticket,
            } => tracing::warn!(event, name = %name, %holder, ticket, "purged dead waiter"),
            Event::PurgedDeadAttachment { name, holder } => {
                tracing::warn!(event, name = %name, %holder, "purged dead attachment")
            }
            Event::RegionCreated { name, size } => {
                tracing::info!(event, name = %name, size, "region created")
            }
            Event::RegionAttached {
                name,
                holder,
                attachments,
            } => tracing::debug!(event, name = %name, %holder, attachments, "region attached"),
            Event::RegionDetached {
                name,
                holder,
                attachments,
            } => tracing::debug!(event, name = %name, %holder, attachments, "region detached"),
            Event::RegionRemoved { name, attachments } => {
                tracing::info!(event, name = %name, attachments, "region removed")
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
