//! Shared region specs
//!
//! Verify payload exchange between participants, bracketed by a coordinator.

use crate::prelude::*;

fn exchange<S: Store>(writer_side: Registry<S>, reader_side: Registry<S>) {
    let region = writer_side.create_region("mailbox", 64).unwrap();
    let full = writer_side
        .open("mailbox.full", 1, &create().initial(0))
        .unwrap();

    let reader = thread::spawn(move || {
        let region = reader_side.attach_region("mailbox").unwrap();
        let full = reader_side
            .open("mailbox.full", 1, &OpenOptions::new())
            .unwrap();
        full.acquire(1, WAIT).unwrap();
        let mut buf = [0u8; 11];
        region.read_at(0, &mut buf).unwrap();
        full.release(1).unwrap();
        buf
    });

    region.write_at(0, b"hello world").unwrap();
    full.release(1).unwrap();

    assert_eq!(&reader.join().unwrap(), b"hello world");
}

#[test]
fn payload_reaches_another_process() {
    let ns = Namespace::empty();
    exchange(ns.registry(), ns.registry());
}

#[test]
fn payload_reaches_another_thread_in_memory() {
    let registry = memory_registry();
    exchange(registry.clone(), registry);
}

#[test]
fn persistent_region_survives_every_detach() {
    let ns = Namespace::empty();
    {
        let region = ns.registry().create_region("cfg", 8).unwrap();
        region.write_at(0, &42u64.to_le_bytes()).unwrap();
    }

    let region = ns.registry().attach_region("cfg").unwrap();
    let mut buf = [0u8; 8];
    region.read_at(0, &mut buf).unwrap();
    assert_eq!(u64::from_le_bytes(buf), 42);
}

#[test]
fn ephemeral_region_files_are_removed() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    let options = RegionOptions::new().exclusive(true).ephemeral(true);
    let region = registry.open_region_with("scratch", 32, &options).unwrap();
    let record = registry.store().region_path("scratch");
    assert!(record.exists());

    region.detach().unwrap();

    assert!(!record.exists());
    let leftovers = std::fs::read_dir(ns.path().join("regions"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == "data"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn out_of_bounds_access_is_invalid() {
    let registry = memory_registry();
    let region = registry.create_region("small", 4).unwrap();

    let err = region.write_at(2, b"abc").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(err.name(), "small");
    assert_eq!(err.op(), Operation::RegionWrite);
}

#[test]
fn size_mismatch_on_open_is_invalid() {
    let ns = Namespace::empty();
    let _region = ns.registry().open_region("buf", 16).unwrap();

    let err = ns.registry().open_region("buf", 32).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn destroyed_region_is_gone_for_new_attachers() {
    let ns = Namespace::empty();
    let registry = ns.registry();
    let region = registry.create_region("buf", 8).unwrap();
    region.write_at(0, b"stale").unwrap();

    ns.registry().destroy_region("buf").unwrap();

    let err = registry.attach_region("buf").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let fresh = registry.create_region("buf", 8).unwrap();
    let mut buf = [0xffu8; 5];
    fresh.read_at(0, &mut buf).unwrap();
    assert_eq!(buf, [0u8; 5]);
}
