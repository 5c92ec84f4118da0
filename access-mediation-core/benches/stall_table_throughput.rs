// access-mediation-core: stall table and engine throughput benchmarks.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use access_mediation_core::config::Config;
use access_mediation_core::event::{Event, EventKind, Payload, ReportFlags, Response};
use access_mediation_core::metrics::Metrics;
use access_mediation_core::stall::{stall, NeverInterrupted, StallTable};

fn sample_event(flags: ReportFlags) -> Event {
    Event {
        request_id: 0,
        tid: 1,
        pgid: 1,
        kind: EventKind::Exec,
        hook_id: 0,
        report_flags: flags,
        inode: None,
        payload: Payload::Exec {
            path: b"/bin/true".to_vec(),
        },
    }
}

fn bench_insert_resolve_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("stall_table_insert_resolve_remove");

    for shards in [1usize, 4, 16, 64] {
        group.bench_with_input(BenchmarkId::new("shards", shards), &shards, |b, &shards| {
            let table = StallTable::new(shards, 1 << 20, 1 << 30);
            let metrics = Metrics::default();
            b.iter(|| {
                let entry = table
                    .insert(
                        sample_event(ReportFlags::AUDIT | ReportFlags::STALL),
                        Response::Allow,
                        &metrics,
                    )
                    .unwrap();
                table.resolve(entry.request_id, Response::Allow, None).unwrap();
                table.remove(entry.request_id);
                black_box(entry.request_id)
            });
        });
    }

    group.finish();
}

fn bench_enqueue_dequeue_nonstall(c: &mut Criterion) {
    let mut group = c.benchmark_group("stall_table_enqueue_dequeue");

    group.bench_function("single_shard", |b| {
        let table = StallTable::new(1, 1 << 20, 1 << 30);
        let metrics = Metrics::default();
        let mut cursor = access_mediation_core::stall::DequeueCursor::default();
        b.iter(|| {
            table
                .enqueue_nonstall(sample_event(ReportFlags::AUDIT), &metrics)
                .unwrap();
            let batch = table.dequeue_batch(&mut cursor, 1 << 20);
            black_box(batch.len())
        });
    });

    group.finish();
}

fn bench_contended_stall_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("stall_contended_resolve");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("one_resolver_one_waiter", |b| {
        b.iter_custom(|iters| {
            let table = Arc::new(StallTable::new(16, 1 << 20, 1 << 30));
            let metrics = Metrics::default();
            let config = Config {
                stall_timeout_ms: 1_000,
                ..Config::default()
            };

            let start = std::time::Instant::now();
            for _ in 0..iters {
                let entry = table
                    .insert(
                        sample_event(ReportFlags::AUDIT | ReportFlags::STALL),
                        Response::Allow,
                        &metrics,
                    )
                    .unwrap();
                let request_id = entry.request_id;

                let resolver_table = table.clone();
                let handle = thread::spawn(move || {
                    resolver_table.resolve(request_id, Response::Allow, None).unwrap();
                });

                let _ = stall(&table, &config, &metrics, request_id, 1, &NeverInterrupted);
                handle.join().unwrap();
            }
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_resolve_remove,
    bench_enqueue_dequeue_nonstall,
    bench_contended_stall_resolve,
);
criterion_main!(benches);
