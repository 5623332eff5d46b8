//! Handoff scheduler specs
//!
//! Two participants printing a-z and A-Z must interleave strictly.

use crate::prelude::*;

fn alternate_letters<S: Store>(lower_side: Registry<S>, upper_side: Registry<S>) -> String {
    let out = Arc::new(Mutex::new(String::new()));

    let spawn_side = |registry: Registry<S>, upper: bool| {
        let out = Arc::clone(&out);
        thread::spawn(move || {
            let (a, b) = registry.make_turn_pair("letters").unwrap();
            let (mine, theirs) = if upper { (b, a) } else { (a, b) };
            for c in 'a'..='z' {
                let turn = mine.wait_turn(WAIT).unwrap();
                out.lock()
                    .unwrap()
                    .push(if upper { c.to_ascii_uppercase() } else { c });
                turn.pass(&theirs).unwrap();
            }
        })
    };
    let upper = spawn_side(upper_side, true);
    let lower = spawn_side(lower_side, false);
    lower.join().unwrap();
    upper.join().unwrap();

    let out = out.lock().unwrap();
    out.clone()
}

fn expected_letters() -> String {
    ('a'..='z')
        .flat_map(|c| [c, c.to_ascii_uppercase()])
        .collect()
}

#[test]
fn turn_pair_alternates_across_processes() {
    let ns = Namespace::empty();
    let out = alternate_letters(ns.registry(), ns.registry());
    similar_asserts::assert_eq!(out, expected_letters());
}

#[test]
fn turn_pair_alternates_in_memory() {
    let registry = memory_registry();
    let out = alternate_letters(registry.clone(), registry);
    similar_asserts::assert_eq!(out, expected_letters());
}

#[test]
fn no_side_runs_twice_in_a_row() {
    let ns = Namespace::empty();
    let out = alternate_letters(ns.registry(), ns.registry());

    let sides: Vec<bool> = out.chars().map(|c| c.is_ascii_uppercase()).collect();
    assert!(sides.windows(2).all(|w| w[0] != w[1]));
    assert!(!sides[0]);
}

#[test]
fn ring_rotates_through_every_participant() {
    let ns = Namespace::empty();
    let log = Arc::new(Mutex::new(Vec::new()));
    const N: usize = 4;

    let participants: Vec<_> = (0..N)
        .map(|i| {
            let registry = ns.registry();
            let log = Arc::clone(&log);
            thread::spawn(move || {
                let ring = registry.make_ring("ring", N).unwrap();
                for _ in 0..3 {
                    let turn = ring[i].wait_turn(WAIT).unwrap();
                    log.lock().unwrap().push(i);
                    turn.pass(&ring[(i + 1) % N]).unwrap();
                }
            })
        })
        .collect();
    for participant in participants {
        participant.join().unwrap();
    }

    let expected: Vec<usize> = (0..3).flat_map(|_| 0..N).collect();
    similar_asserts::assert_eq!(*log.lock().unwrap(), expected);
}

#[test]
fn passing_out_of_turn_is_refused() {
    let registry = memory_registry();
    let (a, b) = registry.make_turn_pair("turns").unwrap();

    let err = turnstile_engine::pass(&b, &a).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotHeld);
    assert_eq!(err.op(), Operation::Pass);
}
