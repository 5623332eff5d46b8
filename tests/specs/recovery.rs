//! Stale-owner recovery specs
//!
//! A child process claims units and exits without releasing them; the
//! survivors must get the units back.

use crate::prelude::*;
use std::path::Path;
use std::process::Command;
use turnstile_engine::{spawn_maintenance, MaintenanceConfig, MaintenanceTask};

const CHILD_DIR_ENV: &str = "TURNSTILE_SPEC_CHILD_DIR";
const CHILD_MODE_ENV: &str = "TURNSTILE_SPEC_CHILD_MODE";

/// Body of the child process; a no-op in a normal test run
#[test]
fn crashing_participant() {
    let Some(dir) = std::env::var_os(CHILD_DIR_ENV) else {
        return;
    };
    let config = CoordinatorConfig::new()
        .with_state_dir(dir)
        .with_poll_interval(Duration::from_millis(2));
    let registry = Registry::open_dir(config).unwrap();
    let handle = registry.open("jobs", 2, &OpenOptions::new()).unwrap();

    match std::env::var(CHILD_MODE_ENV).as_deref() {
        Ok("hold") => handle.acquire(2, WAIT).unwrap(),
        Ok("queue") => {
            let waiter = registry.open("jobs", 2, &OpenOptions::new()).unwrap();
            let _queued = thread::spawn(move || waiter.acquire(1, None));
            while handle.status().unwrap().waiters == 0 {
                thread::sleep(Duration::from_millis(2));
            }
        }
        other => panic!("unknown child mode {other:?}"),
    }
    // Exit without running destructors, as a crash would
    std::process::exit(0);
}

fn run_child(dir: &Path, mode: &str) {
    let status = Command::new(std::env::current_exe().unwrap())
        .args(["recovery::crashing_participant", "--exact", "--nocapture"])
        .env(CHILD_DIR_ENV, dir)
        .env(CHILD_MODE_ENV, mode)
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn units_of_exited_process_are_reclaimed_by_blocked_acquire() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    let handle = registry.open("jobs", 2, &create()).unwrap();

    run_child(ns.path(), "hold");
    assert_eq!(handle.status().unwrap().in_use, 2);

    // Blocks until the watchdog sweep finds the dead holder
    handle.acquire(1, WAIT).unwrap();

    let status = handle.status().unwrap();
    assert_eq!(status.in_use, 1);
    assert_eq!(status.holders, 1);
    assert_eq!(status.attachments, 1);
}

#[test]
fn sweep_purges_waiters_of_exited_process() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    let handle = registry.open("jobs", 2, &create()).unwrap();
    handle.acquire(2, None).unwrap();

    run_child(ns.path(), "queue");
    assert_eq!(handle.status().unwrap().waiters, 1);

    let report = registry.sweep_all().unwrap();

    assert_eq!(report.purged_waiters, 1);
    assert_eq!(report.purged_attachments, 2);
    assert_eq!(report.reclaimed, 0);
    let status = handle.status().unwrap();
    assert_eq!(status.waiters, 0);
    assert_eq!(status.in_use, 2);
}

#[test]
fn live_idle_holders_are_left_alone() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    let handle = registry.open("jobs", 1, &create()).unwrap();
    handle.acquire(1, None).unwrap();
    thread::sleep(Duration::from_millis(150));

    let stats = registry.stats().unwrap();
    assert_eq!(stats.stale_holders, 1);

    let report = registry.sweep_all().unwrap();
    assert!(report.is_empty());
    assert_eq!(handle.held().unwrap(), 1);
}

#[test]
fn heartbeat_keeps_a_holder_fresh() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    let handle = registry.open("jobs", 1, &create()).unwrap();
    handle.acquire(1, None).unwrap();
    thread::sleep(Duration::from_millis(150));

    handle.heartbeat().unwrap();

    assert_eq!(registry.stats().unwrap().stale_holders, 0);
}

#[tokio::test]
async fn maintenance_task_reclaims_in_background() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    let handle = registry.open("jobs", 2, &create()).unwrap();
    run_child(ns.path(), "hold");

    let config = MaintenanceConfig::new().with_interval(Duration::from_millis(20));
    let task = spawn_maintenance(MaintenanceTask::new(config, registry.clone()));

    let mut reclaimed = false;
    for _ in 0..200 {
        if handle.status().unwrap().available == 2 {
            reclaimed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    task.abort();
    assert!(reclaimed);
}
