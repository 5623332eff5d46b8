//! Named resource registry specs
//!
//! Verify create/attach/destroy semantics on both backends.

use crate::prelude::*;

fn attach_shares_state<S: Store>(first: &Registry<S>, second: &Registry<S>) {
    let a = first.open("shared", 2, &create()).unwrap();
    let b = second.open("shared", 5, &OpenOptions::new()).unwrap();

    assert_eq!(b.capacity(), 2);
    assert!(a.try_acquire(2).unwrap());
    assert!(!b.try_acquire(1).unwrap());
    assert_eq!(b.status().unwrap().in_use, 2);
}

#[test]
fn attach_shares_state_on_disk() {
    let ns = Namespace::empty();
    attach_shares_state(&ns.registry(), &ns.registry());
}

#[test]
fn attach_shares_state_in_memory() {
    let registry = memory_registry();
    attach_shares_state(&registry, &registry.clone());
}

#[test]
fn concurrent_openers_share_one_object() {
    let ns = Namespace::empty();
    let barrier = Arc::new(Barrier::new(8));

    let openers: Vec<_> = (0..8)
        .map(|_| {
            let registry = ns.registry();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let handle = registry.open("race", 3, &create()).unwrap();
                (handle.generation().to_string(), handle)
            })
        })
        .collect();
    let opened: Vec<_> = openers.into_iter().map(|t| t.join().unwrap()).collect();

    let generation = &opened[0].0;
    assert!(opened.iter().all(|(g, _)| g == generation));
    assert_eq!(opened[0].1.status().unwrap().attachments, 8);
}

#[test]
fn exclusive_create_has_one_winner() {
    let ns = Namespace::empty();
    let barrier = Arc::new(Barrier::new(6));

    let creators: Vec<_> = (0..6)
        .map(|_| {
            let registry = ns.registry();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry
                    .open("race", 1, &OpenOptions::new().exclusive(true))
                    .map(|handle| handle.close().unwrap())
                    .map_err(|e| e.kind())
            })
        })
        .collect();
    let results: Vec<_> = creators.into_iter().map(|t| t.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.err())
        .all(|kind| kind == ErrorKind::AlreadyExists));
}

#[test]
fn objects_persist_between_registries() {
    let ns = Namespace::empty();
    {
        let registry = ns.registry();
        let handle = registry.open("jobs", 4, &create()).unwrap();
        handle.acquire(3, None).unwrap();
    }

    let registry = ns.registry();
    let handle = registry.open("jobs", 4, &OpenOptions::new()).unwrap();
    let status = handle.status().unwrap();
    assert_eq!(status.available, 1);
    assert_eq!(status.in_use, 3);
    assert_eq!(registry.names().unwrap(), vec!["jobs".to_string()]);
}

#[test]
fn ephemeral_object_is_removed_by_last_close_in_any_process() {
    let ns = Namespace::empty();
    let first = ns.registry();
    let second = ns.registry();
    let a = first
        .open("tmp", 1, &create().ephemeral(true))
        .unwrap();
    let b = second.open("tmp", 1, &OpenOptions::new()).unwrap();

    a.close().unwrap();
    assert_eq!(second.names().unwrap(), vec!["tmp".to_string()]);
    b.close().unwrap();

    assert!(first.names().unwrap().is_empty());
    assert!(!first.store().object_path("tmp").exists());
}

#[test]
fn errors_carry_name_and_operation() {
    let registry = memory_registry();
    let err = registry
        .open("missing", 1, &OpenOptions::new())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.name(), "missing");
    assert_eq!(err.op(), Operation::Open);
    assert_eq!(err.to_string(), "open missing: not found");
}

#[test]
fn corrupted_record_is_reported_then_purged_by_destroy() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    registry.open("jobs", 1, &create()).unwrap().close().unwrap();
    std::fs::write(registry.store().object_path("jobs"), b"{ not json").unwrap();

    let err = registry.open("jobs", 1, &create()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupted);
    assert_eq!(err.name(), "jobs");

    registry.destroy("jobs").unwrap();
    let handle = registry.open("jobs", 2, &create()).unwrap();
    assert_eq!(handle.capacity(), 2);
}

#[test]
fn tampered_record_fails_checksum() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    registry.open("jobs", 3, &create()).unwrap().close().unwrap();

    let path = registry.store().object_path("jobs");
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, text.replacen("\"available\": 3", "\"available\": 2", 1)).unwrap();

    let err = registry.open("jobs", 3, &OpenOptions::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupted);
}

#[test]
fn lock_file_survives_destroy() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    registry.open("jobs", 1, &create()).unwrap().close().unwrap();

    registry.destroy("jobs").unwrap();

    assert!(registry.names().unwrap().is_empty());
    let locks = std::fs::read_dir(ns.path().join("objects"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == "lock"))
        .count();
    assert_eq!(locks, 1);
}
