// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stale-owner recovery
//!
//! A sweep releases grants whose holder is dead and has been idle longer than
//! the staleness threshold, and drops queue entries and attachments left by
//! dead participants. Each object is swept inside one exclusive section.

use crate::registry::{commit, Registry};
use std::time::Duration;
use turnstile_core::{
    Clock, CoordError, ErrorKind, Event, LivenessCheck, Operation, RegionInput, RegionRecord,
    Semaphore, SemaphoreInput,
};
use turnstile_storage::Store;

/// What a sweep changed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Grants released on behalf of dead holders
    pub reclaimed: usize,
    pub reclaimed_weight: u32,
    pub purged_waiters: usize,
    pub purged_attachments: usize,
    /// Records deleted because the sweep left them reclaimable
    pub deleted: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == SweepReport::default()
    }

    pub fn merge(&mut self, other: SweepReport) {
        self.reclaimed += other.reclaimed;
        self.reclaimed_weight += other.reclaimed_weight;
        self.purged_waiters += other.purged_waiters;
        self.purged_attachments += other.purged_attachments;
        self.deleted += other.deleted;
    }
}

/// Sweep one semaphore without touching storage
pub fn sweep_semaphore(
    sem: &Semaphore,
    liveness: &impl LivenessCheck,
    threshold: Duration,
    clock: &impl Clock,
) -> (Semaphore, Vec<Event>, SweepReport) {
    let now = clock.now();
    let mut inputs = Vec::new();

    // Dead waiters go first so reclaimed units reach live ones
    for waiter in &sem.waiters {
        if !liveness.is_alive(&waiter.holder) {
            inputs.push(SemaphoreInput::PurgeWaiter {
                ticket: waiter.ticket,
            });
        }
    }
    for holder in sem.stale_holders(threshold, now) {
        if !liveness.is_alive(&holder.holder) {
            inputs.push(SemaphoreInput::Reclaim {
                grant: holder.grant,
            });
        }
    }
    for attachment in &sem.attachments {
        if !liveness.is_alive(&attachment.holder) {
            inputs.push(SemaphoreInput::PurgeAttachment {
                holder: attachment.holder.clone(),
            });
        }
    }

    let mut current = sem.clone();
    let mut events = Vec::new();
    let mut report = SweepReport::default();
    for input in inputs {
        // Inputs were derived from `sem`, so refusals only mean nothing to do
        if let Ok((next, step)) = current.transition(input, clock) {
            for event in &step.events {
                match event {
                    Event::RecoveredStaleHolder { weight, .. } => {
                        report.reclaimed += 1;
                        report.reclaimed_weight += weight;
                    }
                    Event::PurgedDeadWaiter { .. } => report.purged_waiters += 1,
                    Event::PurgedDeadAttachment { .. } => report.purged_attachments += 1,
                    _ => {}
                }
            }
            events.extend(step.events);
            current = next;
        }
    }
    (current, events, report)
}

/// Drop attachments of dead participants from a region record
pub fn sweep_region_record(
    record: &RegionRecord,
    liveness: &impl LivenessCheck,
    clock: &impl Clock,
) -> (RegionRecord, Vec<Event>, SweepReport) {
    let mut current = record.clone();
    let mut events = Vec::new();
    let mut report = SweepReport::default();
    for attachment in &record.attachments {
        if liveness.is_alive(&attachment.holder) {
            continue;
        }
        let input = RegionInput::PurgeAttachment {
            holder: attachment.holder.clone(),
        };
        if let Ok((next, purged)) = current.transition(input, clock) {
            report.purged_attachments += purged.len();
            events.extend(purged);
            current = next;
        }
    }
    (current, events, report)
}

/// Summary of a namespace
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoordinationStats {
    pub total_objects: usize,
    pub removed_objects: usize,
    pub total_holders: usize,
    /// Holders idle past the staleness threshold, dead or alive
    pub stale_holders: usize,
    pub total_waiters: usize,
    pub total_regions: usize,
}

impl<S: Store, C: Clock, L: LivenessCheck> Registry<S, C, L> {
    /// Sweep one object
    pub fn sweep_object(&self, name: &str) -> Result<SweepReport, CoordError> {
        let op = Operation::Sweep;
        let _span = tracing::debug_span!("object.sweep", name).entered();
        let liveness = self.liveness();
        let clock = self.clock();
        let threshold = self.config().stale_threshold;

        self.modify(name, op, |slot, events| {
            let Some(current) = slot.as_ref() else {
                return Err(CoordError::NotFound {
                    name: name.to_string(),
                    op,
                });
            };
            let (next, swept, mut report) = sweep_semaphore(current, liveness, threshold, clock);
            if swept.is_empty() {
                return Ok(report);
            }
            events.extend(swept);
            let before = events.len();
            commit(slot, next, events);
            if events.len() > before {
                report.deleted += 1;
            }
            Ok(report)
        })
    }

    /// Sweep a region's attachments
    pub fn sweep_region(&self, name: &str) -> Result<SweepReport, CoordError> {
        let op = Operation::Sweep;
        let liveness = self.liveness();
        let clock = self.clock();
        let mut events = Vec::new();

        let report = self
            .store()
            .update_region(name, |slot| {
                let Some(current) = slot.as_ref() else {
                    return SweepReport::default();
                };
                let (next, swept, mut report) = sweep_region_record(current, liveness, clock);
                if swept.is_empty() {
                    return report;
                }
                events = swept;
                if next.is_reclaimable() {
                    report.deleted += 1;
                    *slot = None;
                } else {
                    *slot = Some(next);
                }
                report
            })
            .map_err(|e| e.into_coord(name, op))?;
        for event in &events {
            event.log();
        }
        Ok(report)
    }

    /// Sweep every object and region in the namespace
    ///
    /// Objects that vanish or turn out corrupted mid-sweep are skipped.
    pub fn sweep_all(&self) -> Result<SweepReport, CoordError> {
        let mut total = SweepReport::default();
        for name in self.names()? {
            match self.sweep_object(&name) {
                Ok(report) => total.merge(report),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) if e.kind() == ErrorKind::Corrupted => {
                    tracing::warn!(name = %name, error = %e, "skipping corrupted object");
                }
                Err(e) => return Err(e),
            }
        }
        for name in self.region_names()? {
            match self.sweep_region(&name) {
                Ok(report) => total.merge(report),
                Err(e) if e.kind() == ErrorKind::Corrupted => {
                    tracing::warn!(name = %name, error = %e, "skipping corrupted region");
                }
                Err(e) => return Err(e),
            }
        }
        if !total.is_empty() {
            tracing::info!(
                reclaimed = total.reclaimed,
                purged_waiters = total.purged_waiters,
                purged_attachments = total.purged_attachments,
                "recovery sweep complete"
            );
        }
        Ok(total)
    }

    /// Collect statistics about the namespace
    pub fn stats(&self) -> Result<CoordinationStats, CoordError> {
        let mut stats = CoordinationStats::default();
        let now = self.clock().now();
        let threshold = self.config().stale_threshold;

        for name in self.names()? {
            let sem = match self.load(&name, Operation::Status) {
                Ok(Some(sem)) => sem,
                Ok(None) => continue,
                Err(e) if e.kind() == ErrorKind::Corrupted => continue,
                Err(e) => return Err(e),
            };
            stats.total_objects += 1;
            if sem.removed {
                stats.removed_objects += 1;
            }
            stats.total_holders += sem.holders.len();
            stats.stale_holders += sem.stale_holders(threshold, now).len();
            stats.total_waiters += sem.waiters.len();
        }
        stats.total_regions = self.region_names()?.len();
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
