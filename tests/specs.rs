//! Behavioral specifications for turnstile.
//!
//! These tests drive the public API only. Each `Namespace` is a fresh state
//! directory; every `Namespace::registry()` call stands in for a separate
//! process sharing it.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/registry.rs"]
mod registry;

#[path = "specs/coordinator.rs"]
mod coordinator;

#[path = "specs/region.rs"]
mod region;

#[path = "specs/handoff.rs"]
mod handoff;

#[path = "specs/recovery.rs"]
mod recovery;
