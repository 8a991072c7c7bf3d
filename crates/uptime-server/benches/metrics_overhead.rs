// Benchmark to measure metrics overhead per sweep
// Compare recording with metrics enabled vs disabled

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use uptime::{CheckOutcome, ProbeStatus, ServiceKind, SweepReport, WriteOutcome};
use uptime_server::metrics::MetricsRegistry;

fn sweep_report(checks: usize) -> SweepReport {
    let outcomes = (0..checks)
        .map(|i| CheckOutcome {
            service_id: i as i64,
            kind: ServiceKind::ALL[i % ServiceKind::ALL.len()],
            status: if i % 4 == 0 { ProbeStatus::Down } else { ProbeStatus::Up },
            duration: Duration::from_millis(10),
            write: WriteOutcome::Written,
        })
        .collect();

    SweepReport {
        launched: checks,
        skipped: Vec::new(),
        outcomes,
        panicked: 0,
        elapsed: Duration::from_millis(120),
    }
}

fn bench_metrics_recording(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics_recording");
    let report = sweep_report(10);

    group.bench_function("disabled", |b| {
        let metrics: Option<Arc<MetricsRegistry>> = None;
        b.iter(|| {
            if let Some(ref m) = metrics {
                m.record_sweep(black_box(&report));
            }
        });
    });

    group.bench_function("enabled", |b| {
        let metrics = Some(Arc::new(MetricsRegistry::new()));
        b.iter(|| {
            if let Some(ref m) = metrics {
                m.record_sweep(black_box(&report));
            }
        });
    });

    group.finish();
}

fn bench_individual_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("individual_operations");
    let registry = MetricsRegistry::new();
    let outcome = sweep_report(1).outcomes.remove(0);

    group.bench_function("record_check", |b| {
        b.iter(|| registry.record_check(black_box(&outcome)));
    });

    group.bench_function("record_snapshot_failure", |b| {
        b.iter(|| registry.record_snapshot_failure());
    });

    group.bench_function("encode", |b| {
        registry.record_sweep(&sweep_report(100));
        b.iter(|| black_box(registry.encode()));
    });

    group.finish();
}

fn bench_sweep_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep_size");
    let registry = MetricsRegistry::new();

    for checks in [1, 10, 100, 1000] {
        let report = sweep_report(checks);
        group.bench_with_input(BenchmarkId::from_parameter(checks), &report, |b, report| {
            b.iter(|| registry.record_sweep(black_box(report)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_metrics_recording,
    bench_individual_operations,
    bench_sweep_size
);
criterion_main!(benches);
