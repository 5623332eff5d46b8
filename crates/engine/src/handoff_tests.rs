// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::test_registry;
use std::sync::{Arc, Mutex};
use std::thread;
use turnstile_core::ErrorKind;

const LONG: Option<Duration> = Some(Duration::from_secs(5));

#[test]
fn first_token_moves_first() {
    let (registry, _, _) = test_registry();
    let (a, b) = registry.make_turn_pair("turn").unwrap();

    assert!(a.handle().try_acquire(1).unwrap());
    assert!(!b.handle().try_acquire(1).unwrap());
    assert_eq!(a.name(), "turn.a");
    assert_eq!(b.name(), "turn.b");
}

#[test]
fn pass_moves_the_turn() {
    let (registry, _, _) = test_registry();
    let (a, b) = registry.make_turn_pair("turn").unwrap();

    let turn = a.wait_turn(LONG).unwrap();
    turn.pass(&b).unwrap();

    let status = a.handle().status().unwrap();
    assert_eq!(status.available, 0);
    assert_eq!(status.unowned, 1);
    assert!(!a.handle().try_acquire(1).unwrap());

    let turn = b.wait_turn(LONG).unwrap();
    turn.pass(&a).unwrap();
    assert!(a.handle().try_acquire(1).unwrap());
}

#[test]
fn pass_without_turn_is_not_held() {
    let (registry, _, _) = test_registry();
    let (a, b) = registry.make_turn_pair("turn").unwrap();

    let err = pass(&b, &a).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotHeld);
    assert_eq!(err.op(), Operation::Pass);
}

#[test]
fn turn_pair_alternates_strictly() {
    let (registry, _, _) = test_registry();
    let log = Arc::new(Mutex::new(String::new()));

    let sides: Vec<_> = [false, true]
        .into_iter()
        .map(|upper| {
            let registry = registry.clone();
            let log = Arc::clone(&log);
            thread::spawn(move || {
                let (a, b) = registry.make_turn_pair("letters").unwrap();
                let (mine, theirs) = if upper { (b, a) } else { (a, b) };
                for letter in 'a'..='z' {
                    let turn = mine.wait_turn(LONG).unwrap();
                    let letter = if upper { letter.to_ascii_uppercase() } else { letter };
                    log.lock().unwrap().push(letter);
                    turn.pass(&theirs).unwrap();
                }
            })
        })
        .collect();
    for side in sides {
        side.join().unwrap();
    }

    let expected: String = ('a'..='z')
        .flat_map(|c| [c, c.to_ascii_uppercase()])
        .collect();
    assert_eq!(*log.lock().unwrap(), expected);
}

#[test]
fn ring_visits_participants_in_order() {
    let (registry, _, _) = test_registry();
    let log = Arc::new(Mutex::new(Vec::new()));
    const N: usize = 3;

    let workers: Vec<_> = (0..N)
        .map(|i| {
            let registry = registry.clone();
            let log = Arc::clone(&log);
            thread::spawn(move || {
                let ring = registry.make_ring("ring", N).unwrap();
                for _ in 0..4 {
                    let turn = ring[i].wait_turn(LONG).unwrap();
                    log.lock().unwrap().push(i);
                    turn.pass(&ring[(i + 1) % N]).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let expected: Vec<usize> = (0..4).flat_map(|_| 0..N).collect();
    assert_eq!(*log.lock().unwrap(), expected);
}

#[test]
fn single_token_ring_returns_turn_to_itself() {
    let (registry, _, _) = test_registry();
    let ring = registry.make_ring("solo", 1).unwrap();

    let turn = ring[0].wait_turn(LONG).unwrap();
    turn.pass(&ring[0]).unwrap();

    let turn = ring[0]
        .wait_turn(Some(Duration::from_millis(50)))
        .unwrap();
    turn.pass(&ring[0]).unwrap();
    assert_eq!(ring[0].handle().status().unwrap().available, 1);
}

#[test]
fn empty_ring_is_invalid() {
    let (registry, _, _) = test_registry();
    let err = registry.make_ring("ring", 0).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn attach_turn_pair_requires_existing_pair() {
    let (registry, _, _) = test_registry();
    let err = registry.attach_turn_pair("turn").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let (_a, _b) = registry.make_turn_pair("turn").unwrap();
    let (a, _) = registry.attach_turn_pair("turn").unwrap();
    assert!(a.handle().try_acquire(1).unwrap());
}

#[test]
fn turn_token_needs_unit_capacity() {
    let (registry, _, _) = test_registry();
    let _wide = registry
        .open("turn.a", 2, &OpenOptions::new().create(true))
        .unwrap();

    let err = registry.make_turn_pair("turn").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
