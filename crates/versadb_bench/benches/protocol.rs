//! Open/upgrade/delete protocol benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use versadb_core::{Connection, Factory};

/// Open `name` at `version`, settle, and return the connection.
fn connect(factory: &Factory, name: &str, version: u64) -> Arc<Connection> {
    let request = factory.open_version(name, version).unwrap();
    factory.scheduler().run_until_idle();
    request.result().unwrap()
}

/// Benchmark creating a database from scratch.
fn bench_create(c: &mut Criterion) {
    c.bench_function("create", |b| {
        b.iter(|| {
            let factory = Factory::in_memory();
            let request = factory.open(black_box("bench"));
            factory.scheduler().run_until_idle();
            black_box(request.result());
        });
    });
}

/// Benchmark opening an existing database at its current version.
fn bench_reopen(c: &mut Criterion) {
    c.bench_function("reopen", |b| {
        let factory = Factory::in_memory();
        connect(&factory, "bench", 1).close();

        b.iter(|| {
            let connection = connect(&factory, black_box("bench"), 1);
            connection.close();
        });
    });
}

/// Benchmark upgrades that must close other connections first.
fn bench_upgrade_with_connections(c: &mut Criterion) {
    let mut group = c.benchmark_group("upgrade_with_connections");

    for count in [1, 10, 100].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let factory = Factory::in_memory();
                for _ in 0..count {
                    let connection = connect(&factory, "bench", 1);
                    let target = Arc::downgrade(&connection);
                    connection.on_version_change(move |_| {
                        if let Some(connection) = target.upgrade() {
                            connection.close();
                        }
                    });
                }
                black_box(connect(&factory, "bench", 2));
            });
        });
    }
    group.finish();
}

/// Benchmark deleting a database with no open connections.
fn bench_delete(c: &mut Criterion) {
    c.bench_function("delete", |b| {
        b.iter(|| {
            let factory = Factory::in_memory();
            connect(&factory, "bench", 1).close();
            let request = factory.delete_database("bench");
            factory.scheduler().run_until_idle();
            black_box(request.is_done());
        });
    });
}

/// Benchmark many databases opened in the same turn.
fn bench_concurrent_opens(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_opens");

    for count in [10, 100].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let factory = Factory::in_memory();
                let requests: Vec<_> = (0..count)
                    .map(|i| factory.open(&format!("db_{}", i)))
                    .collect();
                factory.scheduler().run_until_idle();
                black_box(requests);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_create,
    bench_reopen,
    bench_upgrade_with_connections,
    bench_delete,
    bench_concurrent_opens,
);

criterion_main!(benches);
