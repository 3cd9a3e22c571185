use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use serde_json::json;
use storekit::state::tree;
use storekit::{EnhancedStore, ResetOptions, Store};

fn store_creation_benchmark(c: &mut Criterion) {
    c.bench_function("store_creation", |b| {
        b.iter(|| Store::new("bench", || tree(json!({ "count": 0, "name": "bench" }))));
    });
}

fn store_read_benchmark(c: &mut Criterion) {
    let store = Store::new("bench", || tree(json!({ "count": 42 })));

    c.bench_function("store_read", |b| {
        b.iter(|| {
            black_box(store.get("count"));
        });
    });
}

fn store_action_benchmark(c: &mut Criterion) {
    let store = Store::new("bench", || tree(json!({ "count": 0 })));

    c.bench_function("store_action", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store
                .action("set", |state| {
                    state.insert("count".into(), json!(black_box(i)));
                })
                .unwrap();
            i += 1;
        });
    });
}

fn batch_update_benchmark(c: &mut Criterion) {
    let store = Store::new("bench", || {
        tree(json!({ "a": 0, "b": 0, "c": 0, "d": 0 }))
    });

    c.bench_function("batch_update", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store
                .batch_update([
                    ("a", json!(i)),
                    ("b", json!(i + 1)),
                    ("c", json!(i + 2)),
                    ("d", json!(i + 3)),
                ])
                .unwrap();
            i += 1;
        });
    });
}

fn snapshot_benchmark(c: &mut Criterion) {
    let store = Store::new("bench", || {
        tree(json!({
            "count": 0,
            "items": [1, 2, 3, 4, 5],
            "user": { "id": 1, "name": "bench" },
        }))
    });

    c.bench_function("snapshot_create", |b| {
        b.iter(|| {
            black_box(store.create_snapshot());
            store.clear_snapshots();
        });
    });
}

fn reset_benchmark(c: &mut Criterion) {
    let store = Store::new("bench", || tree(json!({ "count": 0, "name": "bench" })));

    c.bench_function("reset", |b| {
        b.iter(|| {
            store.reset_state(ResetOptions::default()).unwrap();
        });
    });
}

fn store_subscribe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_subscribe");

    for subscriber_count in [1, 10, 100].iter() {
        let store = Store::new("bench", || tree(json!({ "value": 0 })));

        for _ in 0..*subscriber_count {
            store.subscribe(|_, _| {
                // Empty subscriber
            });
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0u64;
                b.iter(|| {
                    store
                        .action("set", |state| {
                            state.insert("value".into(), json!(black_box(i)));
                        })
                        .unwrap();
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    store_creation_benchmark,
    store_read_benchmark,
    store_action_benchmark,
    batch_update_benchmark,
    snapshot_benchmark,
    reset_benchmark,
    store_subscribe_benchmark,
);
criterion_main!(benches);
