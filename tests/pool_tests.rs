// tests/pool_tests.rs
use std::sync::Arc;

use warp_pool::{DatasetPool, Key, LockedDataset, MemCodec};

mod common;
use common::{fixture_codec, opts};

fn pool(capacity: usize) -> DatasetPool<MemCodec> {
    DatasetPool::new(Arc::new(fixture_codec()), capacity)
}

fn release(handles: &[Arc<LockedDataset<MemCodec>>]) {
    for handle in handles {
        handle.dec();
    }
}

fn key(uri: &str) -> Key {
    Key::new(uri, &[])
}

#[test]
fn get_capacity_test() {
    let cache = pool(33);
    assert_eq!(cache.capacity(), 33);
    assert_eq!(cache.size(), 0);
}

#[test]
fn get_same_test() {
    let cache = pool(4);
    assert_eq!(cache.size(), 0);
    release(&cache.get(&key("fixture.tif"), 1));
    assert_eq!(cache.size(), 1);
    release(&cache.get(&key("fixture.tif"), 1));
    assert_eq!(cache.size(), 1);
    cache.clear();
    assert_eq!(cache.size(), 0);
}

#[test]
fn get_different_test() {
    let cache = pool(4);
    release(&cache.get(&key("fixture.tif"), 1));
    assert_eq!(cache.size(), 1);
    release(&cache.get(&key("second.tif"), 1));
    assert_eq!(cache.size(), 2);
    cache.clear();
    assert_eq!(cache.size(), 0);
}

#[test]
fn options_distinguish_keys() {
    let cache = pool(4);
    let plain = key("fixture.tif");
    let warped = Key::new("fixture.tif", &opts(&["-r", "bilinear"]));
    release(&cache.get(&plain, 1));
    release(&cache.get(&warped, 1));
    assert_eq!(cache.size(), 2);
    assert_eq!(cache.count(&plain), 1);
    assert_eq!(cache.count(&warped), 1);
}

#[test]
fn enforce_capacity_limit_test() {
    let cache = pool(1);
    release(&cache.get(&key("fixture.tif"), 1));
    release(&cache.get(&key("second.tif"), 1));
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.count(&key("fixture.tif")), 0);
    assert_eq!(cache.count(&key("second.tif")), 1);
}

#[test]
fn evict_correct_test() {
    let cache = pool(2);
    release(&cache.get(&key("fixture.tif"), 1));
    release(&cache.get(&key("second.tif"), 1));
    // Touch the first key so the second becomes the LRU victim.
    release(&cache.get(&key("fixture.tif"), 1));
    release(&cache.get(&key("third.tif"), 1));
    assert_eq!(cache.size(), 2);
    assert_eq!(cache.count(&key("fixture.tif")), 1);
    assert_eq!(cache.count(&key("second.tif")), 0);
    assert_eq!(cache.count(&key("third.tif")), 1);
}

#[test]
fn in_use_copies_are_not_evicted() {
    let cache = pool(1);
    let held = cache.get(&key("fixture.tif"), 1);
    assert_eq!(held.len(), 1);
    // The only slot is pinned by the outstanding handle.
    assert!(cache.get(&key("second.tif"), 1).is_empty());
    assert_eq!(cache.count(&key("fixture.tif")), 1);
    release(&held);
    assert_eq!(cache.get(&key("second.tif"), 1).len(), 1);
    assert_eq!(cache.count(&key("fixture.tif")), 0);
}

#[test]
fn hard_get_grows_copies() {
    let cache = pool(8);
    let handles = cache.get(&key("fixture.tif"), 3);
    assert_eq!(handles.len(), 3);
    assert_eq!(cache.count(&key("fixture.tif")), 3);
    assert_eq!(cache.size(), 3);
    for handle in &handles {
        assert_eq!(handle.key(), &key("fixture.tif"));
        assert!(handle.in_use() >= 1);
    }
    release(&handles);
}

#[test]
fn hard_get_stops_at_capacity() {
    let cache = pool(2);
    let handles = cache.get(&key("fixture.tif"), 5);
    // Fresh copies are in use by this very call, so growth stops at the
    // slot count instead of churning.
    assert_eq!(handles.len(), 2);
    assert_eq!(cache.size(), 2);
    release(&handles);
}

#[test]
fn zero_copies_means_one() {
    let cache = pool(4);
    let handles = cache.get(&key("fixture.tif"), 0);
    assert_eq!(handles.len(), 1);
    release(&handles);
}

#[test]
fn soft_get_returns_existing_copies() {
    let cache = pool(8);
    release(&cache.get(&key("fixture.tif"), 2));
    let handles = cache.get(&key("fixture.tif"), -1);
    // Both pooled copies come back even though only one was asked for.
    assert_eq!(handles.len(), 2);
    release(&handles);
}

#[test]
fn soft_get_can_open_when_uncontended() {
    let cache = pool(4);
    let handles = cache.get(&key("fixture.tif"), -2);
    assert_eq!(handles.len(), 2);
    release(&handles);
}

#[test]
fn failed_open_leaves_no_copy() {
    let cache = pool(2);
    assert!(cache.get(&key("missing.tif"), 1).is_empty());
    assert_eq!(cache.size(), 0);
    assert!(!cache.contains(&key("missing.tif")));
}

#[test]
fn clear_then_get_repopulates() {
    let cache = pool(4);
    release(&cache.get(&key("fixture.tif"), 2));
    release(&cache.get(&key("second.tif"), 1));
    cache.clear();
    assert_eq!(cache.size(), 0);
    let handles = cache.get(&key("fixture.tif"), 2);
    assert_eq!(handles.len(), 2);
    assert_eq!(cache.count(&key("fixture.tif")), 2);
    release(&handles);
}

#[test]
fn outstanding_handles_survive_clear() {
    let cache = pool(2);
    let held = cache.get(&key("fixture.tif"), 1);
    cache.clear();
    assert_eq!(cache.size(), 0);
    // The evicted wrapper stays alive and usable through our handle.
    assert_eq!(held[0].noop(), warp_pool::AttemptOutcome::Success);
    release(&held);
}
