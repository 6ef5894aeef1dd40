//! Integration tests for contexts sharing a SQLite-backed store
//!
//! Each context opens its own handle on one database file, like separate
//! processes would.

use super::common::fixtures::{action, space, test_clock};
use super::common::world::World;
use std::sync::Arc;
use tempfile::TempDir;
use trailmark::{
    Config, ContextProfile, ControllerDeps, Lifecycle, SessionController, SlotStore, SqliteStore,
};

/// Create a world over a fresh database file
fn create_test_world(config: Config) -> (World, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let clock = test_clock();
    let store = SqliteStore::open(dir.path().join("slots.db"), clock.clone())
        .expect("Failed to open store");
    (World::with_store(clock, Arc::new(store), config), dir)
}

/// A second handle on the same file, standing in for another process
fn second_process(world: &World, dir: &TempDir) -> SessionController {
    let store = SqliteStore::open(dir.path().join("slots.db"), world.clock.clone())
        .expect("Failed to open second handle");
    let deps = ControllerDeps {
        store: Arc::new(store),
        ..world.deps()
    };
    SessionController::init(world.config.clone(), deps, ContextProfile::default(), None)
        .expect("Failed to start context")
}

#[test]
fn test_processes_share_pool_and_epoch() {
    let (world, dir) = create_test_world(Config::default());
    let mut a = world.open();
    let mut b = second_process(&world, &dir);

    assert_eq!(a.slot().unwrap().index, 1);
    assert_eq!(b.slot().unwrap().index, 2);
    assert_eq!(a.epoch(), b.epoch());

    a.record(space("/home")).unwrap();
    b.record(action("a")).unwrap();
    assert_eq!(world.slot(1).unwrap().trace, "*1fs");
    assert_eq!(world.slot(2).unwrap().trace, "!1a1");

    a.rotate_epoch().unwrap();
    b.record(action("b")).unwrap();
    assert_eq!(a.epoch(), b.epoch());
    assert_eq!(world.delivered().len(), 1);
}

#[test]
fn test_archive_survives_reopen() {
    let (world, dir) = create_test_world(Config::default());
    let mut a = world.open();
    a.record(action("a")).unwrap();
    a.teardown().unwrap();
    assert_eq!(world.slot(1).unwrap().lifecycle, Lifecycle::Archived);
    drop(world);

    // A later process collects what the last one archived.
    let clock = test_clock();
    let store = SqliteStore::open(dir.path().join("slots.db"), clock.clone())
        .expect("Failed to reopen store");
    let later = World::with_store(clock, Arc::new(store), Config::default());
    let b = later.open();
    assert_eq!(b.slot().unwrap().index, 1);
    assert_eq!(later.delivered().len(), 1);
    assert_eq!(later.delivered()[0].trace, "!1a1");
}

#[test]
fn test_expired_journey_starts_over() {
    let (world, _dir) = create_test_world(Config::default());
    let mut a = world.open();
    a.record(action("a")).unwrap();
    let first = a.epoch().clone();

    world.clock.advance(world.config.epoch_ttl.as_millis() as u64 + 1);
    assert!(world.store.read(&world.config.epoch_key()).unwrap().is_none());

    let b = world.open();
    assert_ne!(b.epoch().key, first.key);
    assert_eq!(b.slot().unwrap().index, 1);
}
