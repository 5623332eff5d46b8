// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semaphore state machine for named coordination objects
//!
//! A semaphore has a fixed capacity of units. Units are either available,
//! held by a recorded grant, or unowned (in use but attributed to nobody, e.g.
//! the empty side of a turn pair). Blocked acquirers wait in a FIFO queue and
//! are granted directly by the transition that frees enough units.
//!
//! Invariant: `available + held_weight() <= capacity`.

use super::holder::HolderId;
use crate::clock::{Clock, Timestamp};
use crate::error::Refusal;
use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Semaphore configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaphoreConfig {
    /// Name identifying this semaphore
    pub name: String,
    /// Total units
    pub capacity: u32,
    /// Delete the object when its last attachment detaches
    #[serde(default)]
    pub ephemeral: bool,
}

impl SemaphoreConfig {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
            ephemeral: false,
        }
    }

    pub fn with_ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }
}

/// A granted claim on capacity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaphoreHolder {
    pub grant: u64,
    pub holder: HolderId,
    pub weight: u32,
    pub acquired_at: Timestamp,
    pub last_heartbeat: Timestamp,
}

impl SemaphoreHolder {
    /// Time since the holder last showed signs of life
    pub fn idle_for(&self, now: Timestamp) -> Duration {
        now.saturating_duration_since(self.last_heartbeat)
    }
}

/// A blocked acquirer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waiter {
    pub ticket: u64,
    pub holder: HolderId,
    pub weight: u32,
    pub enqueued_at: Timestamp,
}

/// An open handle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub holder: HolderId,
    pub attached_at: Timestamp,
}

/// Semaphore state machine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semaphore {
    pub config: SemaphoreConfig,
    /// Distinguishes successive objects created under the same name
    pub generation: String,
    pub available: u32,
    /// Grants in the order they were made
    pub holders: Vec<SemaphoreHolder>,
    pub waiters: VecDeque<Waiter>,
    pub attachments: Vec<Attachment>,
    pub removed: bool,
    pub created_at: Timestamp,
    next_ticket: u64,
}

/// Events that trigger semaphore transitions
#[derive(Clone, Debug)]
pub enum SemaphoreInput {
    /// Take units or join the queue
    Acquire { holder: HolderId, weight: u32 },
    /// Take units only if available now, ignoring the queue
    TryAcquire { holder: HolderId, weight: u32 },
    /// Check a queued ticket
    Poll { ticket: u64 },
    /// Leave the queue (timeout or cancellation)
    Abandon { ticket: u64 },
    /// Return units from the handle's grants, then from unowned units
    Release { holder: HolderId, weight: u32 },
    /// Turn held units into unowned units
    Disown { holder: HolderId, weight: u32 },
    /// Refresh the handle's grants
    Heartbeat { holder: HolderId },
    Attach { holder: HolderId },
    /// Detach a handle, releasing its grants first when `undo` is set
    Detach { holder: HolderId, undo: bool },
    /// Mark removed and drop the queue
    Remove,
    /// Release a grant on behalf of a dead holder
    Reclaim { grant: u64 },
    /// Drop a queued ticket whose owner is dead
    PurgeWaiter { ticket: u64 },
    /// Drop the attachment of a dead handle
    PurgeAttachment { holder: HolderId },
}

/// Result of a transition for the caller that requested it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Granted(u64),
    Queued(u64),
    /// `TryAcquire` found too few units
    Busy,
    Abandoned,
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub outcome: Outcome,
    pub events: Vec<Event>,
}

/// Point-in-time view of a semaphore
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SemaphoreStatus {
    pub name: String,
    pub capacity: u32,
    pub available: u32,
    pub in_use: u32,
    pub unowned: u32,
    pub holders: usize,
    pub waiters: usize,
    pub attachments: usize,
    pub removed: bool,
    pub ephemeral: bool,
}

impl Semaphore {
    /// Create a semaphore with `initial` available units; the rest start unowned
    pub fn new(config: SemaphoreConfig, initial: u32, clock: &impl Clock) -> Self {
        let available = initial.min(config.capacity);
        Self {
            config,
            generation: uuid::Uuid::new_v4().simple().to_string(),
            available,
            holders: Vec::new(),
            waiters: VecDeque::new(),
            attachments: Vec::new(),
            removed: false,
            created_at: clock.now(),
            next_ticket: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn capacity(&self) -> u32 {
        self.config.capacity
    }

    /// Units not available
    pub fn in_use(&self) -> u32 {
        self.config.capacity.saturating_sub(self.available)
    }

    /// Units attributed to recorded grants
    pub fn held_weight(&self) -> u32 {
        self.holders.iter().map(|h| h.weight).sum()
    }

    /// Units in use but attributed to no grant
    pub fn unowned(&self) -> u32 {
        self.in_use().saturating_sub(self.held_weight())
    }

    /// Units held through a handle
    pub fn held_by(&self, holder: &HolderId) -> u32 {
        self.holders
            .iter()
            .filter(|h| h.holder.same_handle(holder))
            .map(|h| h.weight)
            .sum()
    }

    pub fn is_granted(&self, ticket: u64) -> bool {
        self.holders.iter().any(|h| h.grant == ticket)
    }

    /// Position of a ticket in the queue, 0 being the head
    pub fn queue_position(&self, ticket: u64) -> Option<usize> {
        self.waiters.iter().position(|w| w.ticket == ticket)
    }

    /// Grants idle for longer than `threshold` or left over from an earlier boot
    pub fn stale_holders(&self, threshold: Duration, now: Timestamp) -> Vec<&SemaphoreHolder> {
        self.holders
            .iter()
            .filter(|h| h.holder.from_earlier_boot() || h.idle_for(now) > threshold)
            .collect()
    }

    /// Whether the record should be deleted
    pub fn is_reclaimable(&self) -> bool {
        (self.removed && self.holders.is_empty())
            || (self.config.ephemeral && self.attachments.is_empty())
    }

    pub fn status(&self) -> SemaphoreStatus {
        SemaphoreStatus {
            name: self.config.name.clone(),
            capacity: self.config.capacity,
            available: self.available,
            in_use: self.in_use(),
            unowned: self.unowned(),
            holders: self.holders.len(),
            waiters: self.waiters.len(),
            attachments: self.attachments.len(),
            removed: self.removed,
            ephemeral: self.config.ephemeral,
        }
    }

    /// Check structural invariants of a loaded record
    pub fn verify(&self) -> Result<(), String> {
        let capacity = self.config.capacity;
        if capacity == 0 {
            return Err("capacity is zero".to_string());
        }
        if self.available > capacity {
            return Err(format!(
                "available {} exceeds capacity {capacity}",
                self.available
            ));
        }
        let held: u64 = self.holders.iter().map(|h| u64::from(h.weight)).sum();
        if held + u64::from(self.available) > u64::from(capacity) {
            return Err(format!(
                "held {held} plus available {} exceeds capacity {capacity}",
                self.available
            ));
        }
        if let Some(w) = self
            .waiters
            .iter()
            .find(|w| w.weight == 0 || w.weight > capacity)
        {
            return Err(format!("waiter {} has weight {}", w.ticket, w.weight));
        }
        let max_ticket = self
            .holders
            .iter()
            .map(|h| h.grant)
            .chain(self.waiters.iter().map(|w| w.ticket))
            .max()
            .unwrap_or(0);
        if max_ticket >= self.next_ticket {
            return Err(format!(
                "ticket {max_ticket} not below next ticket {}",
                self.next_ticket
            ));
        }
        Ok(())
    }

    /// Pure state transition function
    ///
    /// On refusal the current state is unchanged.
    pub fn transition(
        &self,
        input: SemaphoreInput,
        clock: &impl Clock,
    ) -> Result<(Semaphore, Step), Refusal> {
        let now = clock.now();
        let mut next = self.clone();
        let mut events = Vec::new();

        let outcome = match input {
            SemaphoreInput::Acquire { holder, weight } => {
                self.check_open()?;
                self.check_weight(weight)?;
                let ticket = next.issue_ticket();
                if next.waiters.is_empty() && next.available >= weight {
                    next.grant(ticket, holder.clone(), weight, now);
                    events.push(Event::PermitAcquired {
                        name: self.config.name.clone(),
                        holder,
                        grant: ticket,
                        weight,
                        available: next.available,
                    });
                    Outcome::Granted(ticket)
                } else {
                    next.waiters.push_back(Waiter {
                        ticket,
                        holder: holder.clone(),
                        weight,
                        enqueued_at: now,
                    });
                    events.push(Event::PermitQueued {
                        name: self.config.name.clone(),
                        holder,
                        ticket,
                        weight,
                        position: next.waiters.len() - 1,
                    });
                    Outcome::Queued(ticket)
                }
            }

            SemaphoreInput::TryAcquire { holder, weight } => {
                self.check_open()?;
                self.check_weight(weight)?;
                if next.available >= weight {
                    let ticket = next.issue_ticket();
                    next.grant(ticket, holder.clone(), weight, now);
                    events.push(Event::PermitAcquired {
                        name: self.config.name.clone(),
                        holder,
                        grant: ticket,
                        weight,
                        available: next.available,
                    });
                    Outcome::Granted(ticket)
                } else {
                    events.push(Event::PermitDenied {
                        name: self.config.name.clone(),
                        holder,
                        requested: weight,
                        available: self.available,
                    });
                    Outcome::Busy
                }
            }

            SemaphoreInput::Poll { ticket } => {
                if self.is_granted(ticket) {
                    Outcome::Granted(ticket)
                } else if self.queue_position(ticket).is_some() {
                    Outcome::Queued(ticket)
                } else if self.removed {
                    return Err(Refusal::Removed);
                } else {
                    return Err(Refusal::UnknownTicket(ticket));
                }
            }

            SemaphoreInput::Abandon { ticket } => {
                if self.is_granted(ticket) {
                    // The grant raced the abandonment and wins
                    Outcome::Granted(ticket)
                } else if let Some(pos) = self.queue_position(ticket) {
                    if let Some(waiter) = next.waiters.remove(pos) {
                        events.push(Event::PermitAbandoned {
                            name: self.config.name.clone(),
                            holder: waiter.holder,
                            ticket,
                        });
                    }
                    next.grant_waiters(now, &mut events);
                    Outcome::Abandoned
                } else if self.removed {
                    return Err(Refusal::Removed);
                } else {
                    return Err(Refusal::UnknownTicket(ticket));
                }
            }

            SemaphoreInput::Release { holder, weight } => {
                // Releasing more than capacity is an overrelease, not a bad weight
                if weight == 0 {
                    return Err(Refusal::InvalidWeight {
                        weight,
                        capacity: self.config.capacity,
                    });
                }
                let held = self.held_by(&holder);
                let releasable = held.saturating_add(self.unowned());
                if weight > releasable {
                    return Err(Refusal::Overrelease {
                        requested: weight,
                        releasable,
                    });
                }
                next.take_from_grants(&holder, weight.min(held));
                next.available += weight;
                events.push(Event::PermitReleased {
                    name: self.config.name.clone(),
                    holder,
                    weight,
                    available: next.available,
                });
                next.grant_waiters(now, &mut events);
                Outcome::Done
            }

            SemaphoreInput::Disown { holder, weight } => {
                self.check_weight(weight)?;
                let held = self.held_by(&holder);
                if weight > held {
                    return Err(Refusal::NotHeld {
                        requested: weight,
                        held,
                    });
                }
                next.take_from_grants(&holder, weight);
                events.push(Event::PermitDisowned {
                    name: self.config.name.clone(),
                    holder,
                    weight,
                });
                Outcome::Done
            }

            SemaphoreInput::Heartbeat { holder } => {
                self.check_open()?;
                let mut refreshed = false;
                for h in next
                    .holders
                    .iter_mut()
                    .filter(|h| h.holder.same_handle(&holder))
                {
                    h.last_heartbeat = now;
                    refreshed = true;
                }
                if !refreshed {
                    return Err(Refusal::NotHeld {
                        requested: 1,
                        held: 0,
                    });
                }
                Outcome::Done
            }

            SemaphoreInput::Attach { holder } => {
                self.check_open()?;
                next.attachments.push(Attachment {
                    holder: holder.clone(),
                    attached_at: now,
                });
                events.push(Event::ObjectAttached {
                    name: self.config.name.clone(),
                    holder,
                    attachments: next.attachments.len(),
                });
                Outcome::Done
            }

            SemaphoreInput::Detach { holder, undo } => {
                let held = self.held_by(&holder);
                if undo && held > 0 {
                    next.take_from_grants(&holder, held);
                    next.available += held;
                    events.push(Event::PermitReleased {
                        name: self.config.name.clone(),
                        holder: holder.clone(),
                        weight: held,
                        available: next.available,
                    });
                    next.grant_waiters(now, &mut events);
                }
                next.attachments.retain(|a| !a.holder.same_handle(&holder));
                events.push(Event::ObjectDetached {
                    name: self.config.name.clone(),
                    holder,
                    attachments: next.attachments.len(),
                });
                Outcome::Done
            }

            SemaphoreInput::Remove => {
                self.check_open()?;
                next.removed = true;
                let dropped = next.waiters.len();
                next.waiters.clear();
                events.push(Event::ObjectRemoved {
                    name: self.config.name.clone(),
                    holders: next.holders.len(),
                    dropped_waiters: dropped,
                });
                Outcome::Done
            }

            SemaphoreInput::Reclaim { grant } => {
                let pos = self
                    .holders
                    .iter()
                    .position(|h| h.grant == grant)
                    .ok_or(Refusal::UnknownTicket(grant))?;
                let stale = next.holders.remove(pos);
                next.available += stale.weight;
                events.push(Event::RecoveredStaleHolder {
                    name: self.config.name.clone(),
                    held_for: stale.idle_for(now),
                    holder: stale.holder,
                    grant,
                    weight: stale.weight,
                });
                next.grant_waiters(now, &mut events);
                Outcome::Done
            }

            SemaphoreInput::PurgeWaiter { ticket } => {
                let pos = self
                    .queue_position(ticket)
                    .ok_or(Refusal::UnknownTicket(ticket))?;
                if let Some(waiter) = next.waiters.remove(pos) {
                    events.push(Event::PurgedDeadWaiter {
                        name: self.config.name.clone(),
                        holder: waiter.holder,
                        ticket,
                    });
                }
                next.grant_waiters(now, &mut events);
                Outcome::Done
            }

            SemaphoreInput::PurgeAttachment { holder } => {
                let before = next.attachments.len();
                next.attachments.retain(|a| a.holder != holder);
                if next.attachments.len() != before {
                    events.push(Event::PurgedDeadAttachment {
                        name: self.config.name.clone(),
                        holder,
                    });
                }
                Outcome::Done
            }
        };

        Ok((next, Step { outcome, events }))
    }

    fn check_open(&self) -> Result<(), Refusal> {
        if self.removed {
            Err(Refusal::Removed)
        } else {
            Ok(())
        }
    }

    fn check_weight(&self, weight: u32) -> Result<(), Refusal> {
        if weight == 0 || weight > self.config.capacity {
            Err(Refusal::InvalidWeight {
                weight,
                capacity: self.config.capacity,
            })
        } else {
            Ok(())
        }
    }

    fn issue_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    fn grant(&mut self, ticket: u64, holder: HolderId, weight: u32, now: Timestamp) {
        self.available -= weight;
        self.holders.push(SemaphoreHolder {
            grant: ticket,
            holder,
            weight,
            acquired_at: now,
            last_heartbeat: now,
        });
    }

    /// Grant the longest queue prefix whose head fits
    fn grant_waiters(&mut self, now: Timestamp, events: &mut Vec<Event>) {
        while self
            .waiters
            .front()
            .is_some_and(|w| w.weight <= self.available)
        {
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            self.grant(waiter.ticket, waiter.holder.clone(), waiter.weight, now);
            events.push(Event::PermitGranted {
                name: self.config.name.clone(),
                holder: waiter.holder,
                ticket: waiter.ticket,
                weight: waiter.weight,
                available: self.available,
            });
        }
    }

    /// Remove `weight` units from the handle's grants, newest first
    fn take_from_grants(&mut self, holder: &HolderId, mut weight: u32) {
        for h in self
            .holders
            .iter_mut()
            .rev()
            .filter(|h| h.holder.same_handle(holder))
        {
            if weight == 0 {
                break;
            }
            let taken = weight.min(h.weight);
            h.weight -= taken;
            weight -= taken;
        }
        self.holders.retain(|h| h.weight > 0);
    }
}

#[cfg(test)]
#[path = "semaphore_tests.rs"]
mod tests;
