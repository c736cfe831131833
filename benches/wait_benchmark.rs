/*!
 * Wait/Notify Benchmarks
 *
 * Fast-path costs (value mismatch, empty notify) and the park/wake roundtrip
 */

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use memwait::{CellValue, SharedRegion, SyncManager, Timeout, WakeCount};
use std::thread;
use std::time::Duration;

fn bench_not_equal_fast_path(c: &mut Criterion) {
    let sync = SyncManager::new();
    let region = SharedRegion::new(64).unwrap();
    region.store_u32(0, 1).unwrap();

    c.bench_function("wait_not_equal", |b| {
        b.iter(|| {
            sync.wait(
                black_box(&region),
                black_box(0),
                CellValue::U32(0),
                Timeout::Infinite,
            )
            .unwrap()
        });
    });
}

fn bench_notify_empty(c: &mut Criterion) {
    let sync = SyncManager::new();
    let region = SharedRegion::new(64).unwrap();

    c.bench_function("notify_empty_key", |b| {
        b.iter(|| {
            sync.notify(black_box(&region), black_box(0), WakeCount::All)
                .unwrap()
        });
    });
}

fn bench_park_wake_roundtrip(c: &mut Criterion) {
    let sync = SyncManager::new();
    let region = SharedRegion::new(64).unwrap();

    c.bench_function("park_wake_roundtrip", |b| {
        b.iter(|| {
            let agent_sync = sync.clone();
            let agent_region = region.clone();
            let handle = thread::spawn(move || {
                agent_sync.wait(
                    &agent_region,
                    0,
                    CellValue::U32(0),
                    Timeout::Bounded(Duration::from_secs(5)),
                )
            });

            // Keep notifying until the waiter is actually parked
            while sync.notify(&region, 0, WakeCount::Count(1)).unwrap() == 0 {
                std::hint::spin_loop();
            }
            handle.join().unwrap().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_not_equal_fast_path,
    bench_notify_empty,
    bench_park_wake_roundtrip
);
criterion_main!(benches);
