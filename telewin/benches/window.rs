//! Microbenchmarks for the ingestion path, the tick, and diff computation.
//!
//! Run with: `cargo bench -p telewin -- window`

#![allow(missing_docs, clippy::cast_precision_loss)]

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use telewin::config::{SeriesConfig, WindowConfig};
use telewin::consumer::Consumer;
use telewin::mirror::MirrorSet;
use telewin::registry::Registry;
use telewin::series::Series;
use telewin::sync::SyncState;

fn setup_registry(series_count: usize, span: i64) -> Arc<Registry> {
    let mut config = WindowConfig {
        retention_span: span,
        ..WindowConfig::default()
    };
    for i in 0..series_count {
        config = config.with_series(SeriesConfig::new(format!("metric_{i}"), "v"));
    }
    Arc::new(Registry::new(config).unwrap())
}

fn bench_series_add_trim(c: &mut Criterion) {
    let mut series = Series::new(SeriesConfig::new("bench", "v"), 1000);
    let mut x = 0i64;

    c.bench_function("window/series_add_trim", |b| {
        b.iter(|| {
            x += 1;
            series.add(black_box(x), black_box((x % 97) as f64)).unwrap();
            series.trim(black_box(x - 1000));
        });
    });
}

fn bench_registry_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("window/tick");

    for series_count in [1, 30, 300] {
        let registry = setup_registry(series_count, 1000);
        let handles = registry.handles();

        group.bench_with_input(
            BenchmarkId::from_parameter(series_count),
            &series_count,
            |b, _| {
                b.iter(|| {
                    let x = registry.last_x();
                    for &handle in &handles {
                        registry.add(handle, x, black_box(x as f64)).unwrap();
                    }
                    black_box(registry.tick());
                });
            },
        );
    }

    group.finish();
}

fn bench_diff(c: &mut Criterion) {
    let mut series = Series::new(SeriesConfig::new("bench", "v"), 1000);
    for x in 0..1000 {
        series.add(x, x as f64).unwrap();
    }
    let mut state = SyncState::new(());
    state.diff(&series);
    let mut x = 1000i64;

    c.bench_function("window/diff_incremental", |b| {
        b.iter(|| {
            series.add(x, x as f64).unwrap();
            series.trim(x - 1000);
            x += 1;
            black_box(state.diff(&series));
        });
    });

    c.bench_function("window/diff_full_replace", |b| {
        b.iter(|| {
            let mut fresh = SyncState::new(());
            black_box(fresh.diff(&series));
        });
    });
}

fn bench_consumer_round(c: &mut Criterion) {
    let registry = setup_registry(30, 1000);
    let handles = registry.handles();
    let mut consumer = Consumer::attach(Arc::clone(&registry), MirrorSet::new());

    c.bench_function("window/consumer_round_30_series", |b| {
        b.iter(|| {
            let x = registry.last_x();
            for &handle in &handles {
                registry.add(handle, x, x as f64).unwrap();
            }
            registry.tick();
            black_box(consumer.sync_now().unwrap());
            consumer.egress_mut().take_log();
        });
    });
}

criterion_group!(
    benches,
    bench_series_add_trim,
    bench_registry_tick,
    bench_diff,
    bench_consumer_round
);
criterion_main!(benches);
