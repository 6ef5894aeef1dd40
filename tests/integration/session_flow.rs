//! Integration tests for the multi-context session protocol
//!
//! Every test runs several controllers against one in-memory store, the way
//! independent contexts share one storage medium.

use super::common::fixtures::{action, position, small_pool, space};
use super::common::world::World;
use std::time::Duration;
use trailmark::{decode, Config, Lifecycle, SlotStore, SuspendOutcome};

/// Exceeding the pool archives everything, delivers it once and restarts in slot 1
#[test]
fn test_pool_exhaustion_rolls_journey() {
    let world = World::new(small_pool(2));

    let mut a = world.open();
    for tag in ["a", "b", "c"] {
        a.record(action(tag)).unwrap();
    }
    let mut b = world.open();
    b.record(action("a")).unwrap();
    let first_epoch = a.epoch().clone();
    assert_eq!(b.slot().unwrap().index, 2);

    let c = world.open();
    assert_eq!(c.slot().unwrap().index, 1);
    assert_eq!(c.epoch().key, first_epoch.key);
    assert!(c.epoch().time_ms > first_epoch.time_ms);
    assert_eq!(world.epoch().stamp, *c.epoch());
    assert!(world.epoch().chain.is_empty());

    let delivered = world.delivered();
    assert_eq!(world.transport.deliveries().len(), 1);
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].coarse, 3);
    assert_eq!(delivered[1].coarse, 1);
    assert!(delivered
        .iter()
        .all(|slot| slot.lifecycle == Lifecycle::Archived && slot.epoch == first_epoch));

    let fresh = world.slot(1).unwrap();
    assert!(fresh.belongs_to(c.epoch()));
    assert_eq!(fresh.trace, "");
    assert!(world.slot(2).is_none());

    // Nothing is delivered twice.
    let d = world.open();
    assert_eq!(d.slot().unwrap().index, 2);
    assert_eq!(world.delivered().len(), 2);
}

/// A context that did not mint the new epoch follows it on its next write
#[test]
fn test_epoch_convergence() {
    let world = World::new(Config::default());
    let mut a = world.open();
    let mut b = world.open();
    b.record(action("a")).unwrap();

    a.rotate_epoch().unwrap();
    assert_ne!(a.epoch(), b.epoch());

    b.record(position("10")).unwrap();
    assert_eq!(a.epoch(), b.epoch());
    assert_eq!(b.slot().unwrap().index, 2);
    assert_eq!(b.trace(), "^10");

    a.record(position("20")).unwrap();
    assert_eq!(a.epoch(), b.epoch());
    assert_eq!(a.slot().unwrap().index, 1);
}

/// The event that overflows a slot lands only in the newly claimed one
#[test]
fn test_capacity_rotation_moves_trigger_event() {
    // An empty slot record is 33 bytes at the test clock.
    let world = World::new(Config::default().with_slot_capacity(40));
    let mut a = world.open();
    a.focus().unwrap();

    a.record(space("/home")).unwrap();
    a.record(action("a")).unwrap();

    let old = world.slot(1).unwrap();
    assert_eq!(old.lifecycle, Lifecycle::Stored);
    assert_eq!(old.trace, "*1fs");
    assert_eq!(old.coarse, 0);

    let new = world.slot(2).unwrap();
    assert_eq!(new.lifecycle, Lifecycle::Active);
    assert_eq!(new.trace, "!1a1");
    assert_eq!(new.coarse, 1);
    assert!(world.slot(3).is_none());

    // The chain follows the journey into the new slot.
    assert_eq!(world.epoch().chain, vec![1, 2]);
}

/// Switching focus back and forth terminates each side's continuation
#[test]
fn test_handoff_between_two_contexts() {
    let world = World::new(Config::default());
    let mut a = world.open();
    a.record(space("/home")).unwrap();
    a.focus().unwrap();

    let mut b = world.open();
    assert_eq!(a.suspend().unwrap(), SuspendOutcome::Handoff);
    assert_eq!(world.slot(1).unwrap().trace, "*1fs$>");

    b.focus().unwrap();
    b.record(space("/pricing")).unwrap();
    assert_eq!(world.slot(1).unwrap().trace, "*1fs$>2");
    assert_eq!(world.epoch().chain, vec![1, 2]);

    assert_eq!(b.suspend().unwrap(), SuspendOutcome::LastStanding);
    assert_eq!(world.slot(2).unwrap().trace, "*0cjk$>");

    a.focus().unwrap();
    assert_eq!(world.slot(2).unwrap().trace, "*0cjk$>1");
    assert_eq!(world.epoch().chain, vec![1, 2, 1]);
    assert_eq!(world.slot(1).unwrap().lifecycle, Lifecycle::Active);
    assert_eq!(a.trace(), "*1fs$>2");
}

/// A reloaded context picks its slot back up and keeps appending
#[test]
fn test_restore_after_reload() {
    let world = World::new(Config::default());
    let mut a = world.open();
    a.record(space("/home")).unwrap();
    a.record(action("a")).unwrap();
    let identity = a.identity().unwrap();
    drop(a);

    world.clock.advance(1_000);
    let mut restored = world.reopen(Some(identity));
    assert_eq!(restored.slot().unwrap().index, 1);
    assert_eq!(restored.slot().unwrap().coarse, 1);

    restored.record(action("b")).unwrap();
    assert_eq!(world.slot(1).unwrap().trace, "*1fs!1a1!1b1");
    assert_eq!(world.slot(1).unwrap().coarse, 2);
}

/// An identity from a rolled-over epoch is not restored
#[test]
fn test_reload_into_new_epoch_claims_fresh_slot() {
    let world = World::new(Config::default());
    let mut a = world.open();
    a.record(action("a")).unwrap();
    let identity = a.identity().unwrap();

    let mut b = world.open();
    b.rotate_epoch().unwrap();

    let reloaded = world.reopen(Some(identity));
    assert_eq!(reloaded.epoch(), b.epoch());
    assert_eq!(reloaded.slot().unwrap().index, 2);
    assert_eq!(reloaded.trace(), "");
}

/// Only the last context to terminate archives; the next start collects
#[test]
fn test_last_context_archives_and_next_start_collects() {
    let world = World::new(Config::default());
    let mut a = world.open();
    a.record(action("a")).unwrap();
    let mut b = world.open();
    b.record(action("b")).unwrap();

    a.teardown().unwrap();
    assert_eq!(world.slot(1).unwrap().lifecycle, Lifecycle::Stored);
    assert_eq!(world.slot(2).unwrap().lifecycle, Lifecycle::Active);

    b.teardown().unwrap();
    assert_eq!(world.slot(1).unwrap().lifecycle, Lifecycle::Archived);
    assert_eq!(world.slot(2).unwrap().lifecycle, Lifecycle::Archived);
    assert!(world.transport.deliveries().is_empty());

    let c = world.open();
    assert_eq!(c.slot().unwrap().index, 1);
    let delivered = world.delivered();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].trace, "!1a1");
    assert_eq!(delivered[1].trace, "!1b1");
    assert!(world.slot(2).is_none());
}

/// Slots without enough actions are deleted rather than delivered
#[test]
fn test_short_sessions_are_dropped() {
    let world = World::new(Config::default().with_delete_threshold(2));
    let mut a = world.open();
    a.record(space("/home")).unwrap();
    a.record(action("a")).unwrap();
    a.teardown().unwrap();

    assert!(world.slot(1).is_none());
    let _b = world.open();
    assert!(world.transport.deliveries().is_empty());
}

/// A failed delivery leaves the archive in place for the next claim
#[test]
fn test_delivery_failure_is_retried_on_next_claim() {
    let world = World::new(Config::default());
    let mut a = world.open();
    a.record(action("a")).unwrap();
    a.teardown().unwrap();

    world.transport.set_offline(true);
    let b = world.open();
    assert_eq!(b.slot().unwrap().index, 2);
    assert_eq!(world.slot(1).unwrap().lifecycle, Lifecycle::Archived);
    assert!(world.transport.deliveries().is_empty());

    world.transport.set_offline(false);
    let c = world.open();
    assert_eq!(c.slot().unwrap().index, 1);
    assert_eq!(world.delivered().len(), 1);
}

/// A journey roll that cannot deliver still never loses an archived slot
#[test]
fn test_failed_roll_keeps_undelivered_archives() {
    let world = World::new(small_pool(2));
    let mut a = world.open();
    a.record(action("a")).unwrap();
    let mut b = world.open();
    b.record(action("b")).unwrap();

    world.transport.set_offline(true);
    let c = world.open();
    assert_eq!(c.slot().unwrap().index, 1);
    assert!(world.slot(1).unwrap().belongs_to(c.epoch()));
    assert_eq!(world.slot(2).unwrap().lifecycle, Lifecycle::Archived);
    assert!(world.transport.deliveries().is_empty());

    world.transport.set_offline(false);
    let d = world.open();
    assert_eq!(d.slot().unwrap().index, 2);
    let traces: Vec<String> = world.delivered().into_iter().map(|slot| slot.trace).collect();
    assert_eq!(traces, vec!["!1a1".to_string(), "!1b1".to_string()]);
    assert!(world.store.read("tmb").unwrap().is_none());
}

/// Garbage in the shared store never stops a context from starting
#[test]
fn test_malformed_records_are_treated_as_absent() {
    let world = World::new(Config::default());
    let ttl = Duration::from_secs(60);
    world.store.write("tme", "not an epoch", ttl).unwrap();
    world.store.write("tms1", "not a slot", ttl).unwrap();

    let a = world.open();
    assert_eq!(a.slot().unwrap().index, 1);
    assert_eq!(world.epoch().stamp, *a.epoch());
    assert!(world.slot(1).unwrap().belongs_to(a.epoch()));
}

/// What a controller writes decodes back into the recorded events
#[test]
fn test_recorded_trace_decodes_to_events() {
    let world = World::new(Config::default());
    let mut a = world.open();

    a.record(space("/home")).unwrap();
    world.clock.advance(500);
    a.record(action("a")).unwrap();
    world.clock.advance(500);
    a.record(action("a")).unwrap();
    world.clock.advance(250);
    a.record(position("120")).unwrap();

    let stored = world.slot(1).unwrap();
    assert_eq!(stored.trace, "*1fs~5!1a1+5~2^120");
    assert_eq!(stored.duration_ticks, 12);
    assert_eq!((stored.coarse, stored.fine), (2, 1));

    let events: Vec<(String, u64)> = decode(&stored.trace)
        .into_iter()
        .map(|e| (format!("{}{}", e.kind, e.payload), e.offset_ticks))
        .collect();
    assert_eq!(
        events,
        vec![
            ("space1fs".to_string(), 0),
            ("action1a1".to_string(), 5),
            ("action1a1".to_string(), 10),
            ("position120".to_string(), 12),
        ]
    );
}
