// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared region records
//!
//! The record tracks size and attachments; the bytes live in the store.
//! Regions perform no locking of their contents.

use super::holder::HolderId;
use super::semaphore::Attachment;
use crate::clock::{Clock, Timestamp};
use crate::error::Refusal;
use crate::event::Event;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub name: String,
    pub size: u64,
    pub generation: String,
    pub attachments: Vec<Attachment>,
    /// Delete the region when its last attachment detaches
    #[serde(default)]
    pub ephemeral: bool,
    pub removed: bool,
    pub created_at: Timestamp,
}

#[derive(Clone, Debug)]
pub enum RegionInput {
    Attach { holder: HolderId },
    Detach { holder: HolderId },
    Remove,
    PurgeAttachment { holder: HolderId },
}

impl RegionRecord {
    pub fn new(name: impl Into<String>, size: u64, ephemeral: bool, clock: &impl Clock) -> Self {
        Self {
            name: name.into(),
            size,
            generation: uuid::Uuid::new_v4().simple().to_string(),
            attachments: Vec::new(),
            ephemeral,
            removed: false,
            created_at: clock.now(),
        }
    }

    pub fn attach_count(&self) -> usize {
        self.attachments.len()
    }

    /// Whether the record and its bytes should be deleted
    pub fn is_reclaimable(&self) -> bool {
        self.removed || (self.ephemeral && self.attachments.is_empty())
    }

    pub fn verify(&self) -> Result<(), String> {
        if self.size == 0 {
            return Err("size is zero".to_string());
        }
        if self.generation.is_empty() {
            return Err("missing generation".to_string());
        }
        Ok(())
    }

    pub fn transition(
        &self,
        input: RegionInput,
        clock: &impl Clock,
    ) -> Result<(RegionRecord, Vec<Event>), Refusal> {
        let mut next = self.clone();
        let mut events = Vec::new();

        match input {
            RegionInput::Attach { holder } => {
                if self.removed {
                    return Err(Refusal::Removed);
                }
                next.attachments.push(Attachment {
                    holder: holder.clone(),
                    attached_at: clock.now(),
                });
                events.push(Event::RegionAttached {
                    name: self.name.clone(),
                    holder,
                    attachments: next.attachments.len(),
                });
            }
            RegionInput::Detach { holder } => {
                next.attachments.retain(|a| !a.holder.same_handle(&holder));
                events.push(Event::RegionDetached {
                    name: self.name.clone(),
                    holder,
                    attachments: next.attachments.len(),
                });
            }
            RegionInput::Remove => {
                if self.removed {
                    return Err(Refusal::Removed);
                }
                next.removed = true;
                events.push(Event::RegionRemoved {
                    name: self.name.clone(),
                    attachments: next.attachments.len(),
                });
            }
            RegionInput::PurgeAttachment { holder } => {
                let before = next.attachments.len();
                next.attachments.retain(|a| a.holder != holder);
                if next.attachments.len() != before {
                    events.push(Event::PurgedDeadAttachment {
                        name: self.name.clone(),
                        holder,
                    });
                }
            }
        }

        Ok((next, events))
    }
}
