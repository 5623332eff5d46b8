//! Counting coordinator specs
//!
//! Verify acquire/release semantics, blocking, fairness and capacity bounds.

use crate::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

fn try_acquire_scenario<S: Store>(a_registry: &Registry<S>, b_registry: &Registry<S>) {
    let a = a_registry.open("door", 1, &create()).unwrap();
    let b = b_registry.open("door", 1, &OpenOptions::new()).unwrap();

    a.acquire(1, None).unwrap();
    assert!(!b.try_acquire(1).unwrap());
    assert_eq!(a.status().unwrap().available, 0);

    a.release(1).unwrap();
    assert!(b.try_acquire(1).unwrap());
    assert_eq!(b.held().unwrap(), 1);
}

#[test]
fn try_acquire_fails_while_held_on_disk() {
    let ns = Namespace::empty();
    try_acquire_scenario(&ns.registry(), &ns.registry());
}

#[test]
fn try_acquire_fails_while_held_in_memory() {
    let registry = memory_registry();
    try_acquire_scenario(&registry, &registry.clone());
}

fn never_exceeds_capacity<S: Store>(registry: Registry<S>) {
    let inside = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));
    registry.open("pool", 3, &create()).unwrap().close().unwrap();

    let workers: Vec<_> = (0..6)
        .map(|_| {
            let registry = registry.clone();
            let inside = Arc::clone(&inside);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                let handle = registry.open("pool", 3, &OpenOptions::new()).unwrap();
                for _ in 0..5 {
                    let permit = handle.acquire_permit(1, WAIT).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    drop(permit);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    let status = registry
        .open("pool", 3, &OpenOptions::new())
        .unwrap()
        .status()
        .unwrap();
    assert_eq!(status.available, 3);
}

#[test]
fn concurrent_holders_never_exceed_capacity_on_disk() {
    let ns = Namespace::empty();
    never_exceeds_capacity(ns.registry());
}

#[test]
fn concurrent_holders_never_exceed_capacity_in_memory() {
    never_exceeds_capacity(memory_registry());
}

#[test]
fn release_in_one_process_wakes_waiter_in_another() {
    let ns = Namespace::empty();
    let owner = ns.registry().open("door", 1, &create()).unwrap();
    owner.acquire(1, None).unwrap();

    let other = ns.registry();
    let waiter = thread::spawn(move || {
        let handle = other.open("door", 1, &OpenOptions::new()).unwrap();
        handle.acquire(1, WAIT).unwrap();
        handle.held().unwrap()
    });
    while owner.status().unwrap().waiters == 0 {
        thread::sleep(Duration::from_millis(2));
    }
    owner.release(1).unwrap();

    assert_eq!(waiter.join().unwrap(), 1);
}

#[test]
fn timeout_reports_wait_and_leaves_no_trace() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    let owner = registry.open("door", 1, &create()).unwrap();
    owner.acquire(1, None).unwrap();

    let other = ns.registry().open("door", 1, &OpenOptions::new()).unwrap();
    let err = other
        .acquire(1, Some(Duration::from_millis(40)))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.name(), "door");
    let status = owner.status().unwrap();
    assert_eq!(status.waiters, 0);
    assert_eq!(status.in_use, 1);
}

#[test]
fn cancelling_a_wait_returns_cancelled() {
    let registry = memory_registry();
    let owner = registry.open("door", 1, &create()).unwrap();
    owner.acquire(1, None).unwrap();
    let cancel = CancelToken::new();

    let waiter = {
        let registry = registry.clone();
        let cancel = cancel.clone();
        thread::spawn(move || {
            let handle = registry.open("door", 1, &OpenOptions::new()).unwrap();
            let options = AcquireOptions::new()
                .with_cancel(cancel)
                .with_timeout(Duration::from_secs(10));
            handle.acquire_with(1, &options).unwrap_err().kind()
        })
    };
    while owner.status().unwrap().waiters == 0 {
        thread::sleep(Duration::from_millis(2));
    }
    cancel.cancel();

    assert_eq!(waiter.join().unwrap(), ErrorKind::Cancelled);
}

#[test]
fn destroy_fails_waiters_in_other_processes() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    let owner = registry.open("door", 1, &create()).unwrap();
    owner.acquire(1, None).unwrap();

    let other = ns.registry();
    let waiter = thread::spawn(move || {
        let handle = other.open("door", 1, &OpenOptions::new()).unwrap();
        handle.acquire(1, WAIT).unwrap_err().kind()
    });
    while owner.status().unwrap().waiters == 0 {
        thread::sleep(Duration::from_millis(2));
    }
    registry.destroy("door").unwrap();

    assert_eq!(waiter.join().unwrap(), ErrorKind::Removed);
    owner.release(1).unwrap();
    assert!(registry.names().unwrap().is_empty());
}

#[test]
fn overrelease_is_surfaced() {
    let registry = memory_registry();
    let handle = registry.open("door", 2, &create()).unwrap();
    handle.acquire(1, None).unwrap();

    let err = handle.release(2).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Overrelease);
    assert_eq!(err.op(), Operation::Release);
    assert_eq!(handle.status().unwrap().in_use, 1);
}

#[test]
fn undo_handles_release_on_close() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    let handle = registry
        .open("door", 2, &create().undo(true))
        .unwrap();
    handle.acquire(2, None).unwrap();

    drop(handle);

    let observer = ns.registry().open("door", 2, &OpenOptions::new()).unwrap();
    assert_eq!(observer.status().unwrap().available, 2);
}

#[test]
fn semaphore_signalling_between_processes() {
    let ns = Namespace::empty();
    let producer = ns
        .registry()
        .open("items", 4, &create().initial(0))
        .unwrap();

    let consumer_registry = ns.registry();
    let consumer = thread::spawn(move || {
        let handle = consumer_registry.open("items", 4, &OpenOptions::new()).unwrap();
        for _ in 0..4 {
            handle.acquire(1, WAIT).unwrap();
            handle.disown(1).unwrap();
        }
    });
    for _ in 0..4 {
        producer.release(1).unwrap();
    }
    consumer.join().unwrap();

    let status = producer.status().unwrap();
    assert_eq!(status.available, 0);
    assert_eq!(status.unowned, 4);
}

#[tokio::test]
async fn async_acquire_waits_without_blocking_the_runtime() {
    let registry = memory_registry();
    let owner = registry.open("door", 1, &create()).unwrap();
    owner.acquire(1, None).unwrap();
    let waiter = Arc::new(registry.open("door", 1, &OpenOptions::new()).unwrap());

    let pending = tokio::spawn(turnstile_engine::acquire_async(Arc::clone(&waiter), 1, WAIT));
    tokio::time::sleep(Duration::from_millis(20)).await;
    owner.release(1).unwrap();

    pending.await.unwrap().unwrap();
    assert_eq!(waiter.held().unwrap(), 1);
}
