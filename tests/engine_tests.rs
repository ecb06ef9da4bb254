// tests/engine_tests.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use warp_pool::errors::codes;
use warp_pool::stress::{self, StressOp, StressSpec};
use warp_pool::{DatasetKind, Key, MemCodec, PixelType, PoolConfig, WarpPool};

mod common;
use common::{fixture_codec, opts, WARP_OPTIONS};

fn make_pool(capacity: usize) -> WarpPool<MemCodec> {
    WarpPool::new(PoolConfig::new(capacity), fixture_codec()).expect("pool init")
}

#[test]
fn nodata_on_the_warped_band() {
    let pool = make_pool(256);
    let token = pool.get_token("fixture.tif", &opts(&WARP_OPTIONS));
    let (mut nodata, mut success) = (0.0, -1);
    let n = pool.get_band_nodata(
        token,
        DatasetKind::Warped,
        42,
        -4,
        0,
        1,
        &mut nodata,
        &mut success,
    );
    assert!(n > 0, "expected success, got {}", n);
    assert_eq!(nodata, 107.0);
    assert_ne!(success, 0);
}

#[test]
fn nodata_absent_on_the_source_band() {
    let pool = make_pool(256);
    let token = pool.get_token("fixture.tif", &opts(&WARP_OPTIONS));
    let (mut nodata, mut success) = (0.0, -1);
    let n = pool.get_band_nodata(
        token,
        DatasetKind::Source,
        42,
        -4,
        0,
        1,
        &mut nodata,
        &mut success,
    );
    assert!(n > 0);
    assert_eq!(success, 0);
}

#[test]
fn bad_uri_answers_open_failed() {
    let pool = make_pool(256);
    let token = pool.get_token("NO_SUCH_FILE.tif", &opts(&WARP_OPTIONS));
    let (mut width, mut height) = (0, 0);
    let n = pool.get_width_height(token, DatasetKind::Warped, 42, -4, 0, &mut width, &mut height);
    assert_eq!(n, -codes::OPEN_FAILED);
}

#[test]
fn bad_token_answers_open_failed_without_touching_the_pool() {
    let pool = make_pool(256);
    let (mut width, mut height) = (0, 0);
    let n = pool.get_width_height(93, DatasetKind::Warped, 42, -4, 0, &mut width, &mut height);
    assert_eq!(n, -codes::OPEN_FAILED);
    assert_eq!(pool.pool().size(), 0);
}

#[test]
fn bad_requests_propagate_codec_codes() {
    let pool = make_pool(256);
    let token = pool.get_token("fixture.tif", &opts(&WARP_OPTIONS));
    let mut data = [0u8; 8];

    let n = pool.get_data(
        token,
        DatasetKind::Warped,
        2,
        -1,
        0,
        [33, 42, 100, 100],
        [4, 2],
        42,
        PixelType::Byte,
        &mut data,
    );
    assert_eq!(n, -codes::ILLEGAL_ARG);

    let mut small = [0u8; 2];
    let n = pool.get_data(
        token,
        DatasetKind::Warped,
        2,
        -1,
        0,
        [33, 42, 100, 100],
        [4, 2],
        1,
        PixelType::Byte,
        &mut small,
    );
    assert_eq!(n, -codes::APP_DEFINED);

    let n = pool.get_data(
        token,
        DatasetKind::Warped,
        2,
        -1,
        0,
        [500, 500, 100, 100],
        [4, 2],
        1,
        PixelType::Byte,
        &mut data,
    );
    assert_eq!(n, -codes::OBJECT_NULL);
}

#[test]
fn pixel_round_trip() {
    let pool = make_pool(256);
    let token = pool.get_token("fixture.tif", &opts(&WARP_OPTIONS));
    let mut data = [0u8; 8];
    let n = pool.get_data(
        token,
        DatasetKind::Warped,
        42,
        -4,
        0,
        [33, 42, 100, 100],
        [4, 2],
        1,
        PixelType::Byte,
        &mut data,
    );
    assert!(n > 0);
    assert_eq!(data, [0x01, 0x01, 0x01, 0x00, 0x01, 0x01, 0x01, 0x00]);
}

#[test]
fn contention_growth_under_many_threads() {
    let pool = Arc::new(make_pool(4));
    let token = pool.get_token("fixture.tif", &opts(&WARP_OPTIONS));

    // Warm the pool to its copy target so the soft gets below always find
    // at least one copy.
    assert!(pool.noop(token, DatasetKind::Warped, 1, 4, 0) > 0);
    let key = Key::new("fixture.tif", &opts(&WARP_OPTIONS));
    assert_eq!(pool.pool().count(&key), 4);

    // Watch the capacity bound from outside while the stress runs.
    let done = Arc::new(AtomicBool::new(false));
    let watcher = {
        let pool = Arc::clone(&pool);
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                assert!(pool.pool().size() <= 4);
                std::thread::yield_now();
            }
        })
    };

    let spec = StressSpec {
        threads: 128,
        iterations: 20,
        attempts: 0,
        copies: -4,
        nanos: 0,
        dataset: DatasetKind::Warped,
        op: StressOp::Pixels {
            src_window: [33, 42, 100, 100],
            dst_window: [4, 2],
            band: 1,
        },
    };
    let report = stress::run(Arc::clone(&pool), token, spec);
    done.store(true, Ordering::Relaxed);
    watcher.join().expect("watcher saw an oversized pool");

    assert_eq!(report.operations, 128 * 20);
    assert_eq!(report.failures, 0, "last error {}", report.last_error);
    assert!(report.reuse_rate() >= 1.0);
    assert!(pool.pool().size() <= 4);
}

#[test]
fn unbounded_attempts_spellings_behave_identically() {
    let pool = make_pool(16);
    let token = pool.get_token("fixture.tif", &opts(&WARP_OPTIONS));
    let (mut width, mut height) = (0, 0);
    let zero = pool.get_width_height(token, DatasetKind::Warped, 0, 1, 0, &mut width, &mut height);
    let negative =
        pool.get_width_height(token, DatasetKind::Warped, -7, 1, 0, &mut width, &mut height);
    assert!(zero > 0);
    assert_eq!(zero, negative);
    assert_eq!((width, height), (512, 512));
}

#[test]
fn zero_copies_behaves_as_one() {
    let pool = make_pool(16);
    let token = pool.get_token("fixture.tif", &opts(&WARP_OPTIONS));
    let (mut width, mut height) = (0, 0);
    let n = pool.get_width_height(token, DatasetKind::Warped, 1, 0, 0, &mut width, &mut height);
    assert!(n > 0);
    let key = Key::new("fixture.tif", &opts(&WARP_OPTIONS));
    assert_eq!(pool.pool().count(&key), 1);
}

#[test]
fn time_budget_is_honored() {
    let pool = make_pool(16);
    let token = pool.get_token("fixture.tif", &opts(&WARP_OPTIONS));
    let mut data = [0u8; 8];
    let budget = Duration::from_millis(50);
    let start = Instant::now();
    // Unbounded attempts against a request that can never succeed: only the
    // time budget ends the call.
    let n = pool.get_data(
        token,
        DatasetKind::Warped,
        0,
        1,
        budget.as_nanos() as u64,
        [33, 42, 100, 100],
        [4, 2],
        42,
        PixelType::Byte,
        &mut data,
    );
    let elapsed = start.elapsed();
    assert_eq!(n, -codes::FILE_IO);
    assert!(elapsed >= budget);
    assert!(elapsed < budget + Duration::from_secs(5));
}

#[test]
fn reference_counts_balance_across_calls() {
    let pool = make_pool(16);
    let token = pool.get_token("fixture.tif", &opts(&WARP_OPTIONS));
    let key = Key::new("fixture.tif", &opts(&WARP_OPTIONS));

    assert!(pool.noop(token, DatasetKind::Warped, 1, 3, 0) > 0);
    let handles = pool.pool().get(&key, 3);
    assert_eq!(handles.len(), 3);
    let before: Vec<u32> = handles.iter().map(|h| h.in_use()).collect();

    let (mut width, mut height) = (0, 0);
    for _ in 0..10 {
        assert!(
            pool.get_width_height(token, DatasetKind::Warped, 0, -3, 0, &mut width, &mut height)
                > 0
        );
    }

    let after: Vec<u32> = handles.iter().map(|h| h.in_use()).collect();
    assert_eq!(before, after);
    for handle in &handles {
        assert_eq!(handle.in_use(), 1);
        handle.dec();
    }
}

#[test]
fn success_returns_are_positive_and_failures_negative() {
    let pool = make_pool(16);
    let token = pool.get_token("fixture.tif", &opts(&WARP_OPTIONS));
    let mut count = 0;
    let ok = pool.get_band_count(token, DatasetKind::Source, 4, 1, 0, &mut count);
    assert!(ok > 0);
    let bad = pool.get_band_count(93, DatasetKind::Source, 4, 1, 0, &mut count);
    assert!(bad < 0);
}
