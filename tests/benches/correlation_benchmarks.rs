//! # Quantum-Bus Correlation Benchmarks
//!
//! | Path | Operation | Target |
//! |------|-----------|--------|
//! | Pending table | register + complete | < 5µs |
//! | Response router | route one response | < 5µs |
//! | Timeout sweeper | sweep 10k entries | < 10ms |
//! | End to end | send over in-memory bus | < 1ms |

#![allow(clippy::excessive_nesting)]

use criterion::{black_box, BatchSize, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qb_request_response::{
    CancellationToken, Outcome, PendingRequestTable, ResponseEnvelope, ResponseRouter,
    TimeoutSweeper, TracingSink,
};
use qb_tests::integration::fixtures::{GetOrder, Harness, OrderHandler, ORDERS_TOPIC};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Pending table
// ============================================================================

fn bench_pending_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending-table");
    let table = PendingRequestTable::new();
    let deadline = Instant::now() + Duration::from_secs(3600);

    group.bench_function("register_complete", |b| {
        b.iter(|| {
            let waiter = table.register("orders.GetOrder", "orders.Order", deadline);
            black_box(table.try_complete(waiter.correlation_id, Outcome::Resolved(serde_json::Value::Null)))
        })
    });

    group.bench_function("register_drop_guard", |b| {
        b.iter(|| {
            let waiter = table.register("orders.GetOrder", "orders.Order", deadline);
            let _guard = table.guard(waiter.correlation_id);
        })
    });

    // Lookups against a populated table
    let mut rng = rand::thread_rng();
    for size in [100usize, 10_000] {
        let populated = PendingRequestTable::new();
        let waiters: Vec<_> = (0..size)
            .map(|_| populated.register("a", "b", deadline))
            .collect();

        group.bench_with_input(BenchmarkId::new("is_pending", size), &waiters, |b, waiters| {
            b.iter(|| {
                let waiter = &waiters[rng.gen_range(0..waiters.len())];
                black_box(populated.is_pending(&waiter.correlation_id))
            })
        });
    }

    group.finish();
}

// ============================================================================
// Response router
// ============================================================================

fn bench_router(c: &mut Criterion) {
    let mut group = c.benchmark_group("response-router");
    let table = Arc::new(PendingRequestTable::new());
    let router = ResponseRouter::new(table.clone(), Arc::new(TracingSink));
    let deadline = Instant::now() + Duration::from_secs(3600);

    group.bench_function("route_payload", |b| {
        b.iter(|| {
            let waiter = table.register("a", "orders.Order", deadline);
            let response = ResponseEnvelope::payload(waiter.correlation_id, serde_json::json!({"id": 1}))
                .with_response_type("orders.Order");
            black_box(router.on_response_received(response))
        })
    });

    group.bench_function("route_orphan", |b| {
        b.iter(|| {
            let response = ResponseEnvelope::payload(
                qb_request_response::CorrelationId::new(),
                serde_json::Value::Null,
            );
            black_box(router.on_response_received(response))
        })
    });

    group.finish();
}

// ============================================================================
// Timeout sweeper
// ============================================================================

fn bench_sweeper(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeout-sweeper");
    group.measurement_time(Duration::from_secs(10));

    for size in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("sweep_all_due", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let table = Arc::new(PendingRequestTable::new());
                    let now = Instant::now();
                    let waiters: Vec<_> = (0..size).map(|_| table.register("a", "b", now)).collect();
                    let sweeper = TimeoutSweeper::new(table, Arc::new(TracingSink), Duration::from_secs(1));
                    (sweeper, waiters)
                },
                |(sweeper, waiters)| {
                    black_box(sweeper.sweep_once());
                    drop(waiters);
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

// ============================================================================
// End to end
// ============================================================================

fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end-to-end");
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => panic!("failed to build runtime: {e}"),
    };

    let harness = runtime.block_on(async {
        let mut harness = Harness::standard();
        harness.serve::<GetOrder, _>(ORDERS_TOPIC, OrderHandler);
        harness
    });

    group.bench_function("send_get_order", |b| {
        b.to_async(&runtime).iter(|| async {
            let order = harness
                .requests
                .send(GetOrder { id: 7 }, CancellationToken::new())
                .await;
            black_box(order.is_ok())
        })
    });

    group.finish();
    runtime.block_on(harness.shutdown());
}

criterion_group!(benches, bench_pending_table, bench_router, bench_sweeper, bench_end_to_end);
criterion_main!(benches);
