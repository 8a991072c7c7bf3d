//! Prometheus metrics for the uptime server.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::time::Duration;
use uptime::{CheckOutcome, SweepReport};

/// Labels for check result metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CheckLabels {
    /// Service kind (http, tcp, ping)
    pub kind: String,
    /// Probe status (up, down, timeout, error)
    pub status: String,
}

/// Labels for per-kind metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct KindLabels {
    pub kind: String,
}

/// Metrics registry with all uptime server metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    // Sweep metrics
    sweeps_total: Counter,
    snapshot_failures_total: Counter,
    sweep_duration_seconds: Histogram,
    services_in_snapshot: Gauge,
    services_skipped_total: Counter,
    check_tasks_panicked_total: Counter,

    // Per-check metrics
    checks_total: Family<CheckLabels, Counter>,
    check_duration_seconds: Family<KindLabels, Histogram>,

    // Observation log metrics
    observations_written_total: Counter,
    observations_discarded_total: Counter,
    observation_write_failures_total: Counter,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let sweeps_total = Counter::default();
        registry.register("uptime_sweeps", "Sweeps completed", sweeps_total.clone());

        let snapshot_failures_total = Counter::default();
        registry.register(
            "uptime_snapshot_failures",
            "Sweeps abandoned because the registry could not be read",
            snapshot_failures_total.clone(),
        );

        // 10ms to ~80s
        let sweep_duration_seconds = Histogram::new(exponential_buckets(0.01, 2.0, 14));
        registry.register(
            "uptime_sweep_duration_seconds",
            "Time from registry snapshot to last finished check",
            sweep_duration_seconds.clone(),
        );

        let services_in_snapshot = Gauge::default();
        registry.register(
            "uptime_services_in_snapshot",
            "Services seen by the most recent sweep",
            services_in_snapshot.clone(),
        );

        let services_skipped_total = Counter::default();
        registry.register(
            "uptime_services_skipped",
            "Services skipped because their kind has no checker",
            services_skipped_total.clone(),
        );

        let check_tasks_panicked_total = Counter::default();
        registry.register(
            "uptime_check_tasks_panicked",
            "Check tasks that did not run to completion",
            check_tasks_panicked_total.clone(),
        );

        let checks_total = Family::<CheckLabels, Counter>::default();
        registry.register(
            "uptime_checks",
            "Checks performed by kind and status",
            checks_total.clone(),
        );

        // 1ms to ~16s
        let check_duration_seconds = Family::<KindLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.001, 2.0, 15))
        });
        registry.register(
            "uptime_check_duration_seconds",
            "Probe duration in seconds",
            check_duration_seconds.clone(),
        );

        let observations_written_total = Counter::default();
        registry.register(
            "uptime_observations_written",
            "Observations appended to the log",
            observations_written_total.clone(),
        );

        let observations_discarded_total = Counter::default();
        registry.register(
            "uptime_observations_discarded",
            "Observations dropped because the service was removed mid-check",
            observations_discarded_total.clone(),
        );

        let observation_write_failures_total = Counter::default();
        registry.register(
            "uptime_observation_write_failures",
            "Observations the store failed to append",
            observation_write_failures_total.clone(),
        );

        Self {
            registry,
            sweeps_total,
            snapshot_failures_total,
            sweep_duration_seconds,
            services_in_snapshot,
            services_skipped_total,
            check_tasks_panicked_total,
            checks_total,
            check_duration_seconds,
            observations_written_total,
            observations_discarded_total,
            observation_write_failures_total,
        }
    }

    /// Record a finished sweep and every check in it
    pub fn record_sweep(&self, report: &SweepReport) {
        self.sweeps_total.inc();
        self.sweep_duration_seconds
            .observe(report.elapsed.as_secs_f64());
        self.services_in_snapshot
            .set((report.launched + report.skipped.len()) as i64);
        self.services_skipped_total
            .inc_by(report.skipped.len() as u64);
        self.check_tasks_panicked_total
            .inc_by(report.panicked as u64);

        self.observations_written_total
            .inc_by(report.written() as u64);
        self.observations_discarded_total
            .inc_by(report.discarded() as u64);
        self.observation_write_failures_total
            .inc_by(report.write_failures() as u64);

        for outcome in &report.outcomes {
            self.record_check(outcome);
        }
    }

    /// Record one probe
    pub fn record_check(&self, outcome: &CheckOutcome) {
        self.checks_total
            .get_or_create(&CheckLabels {
                kind: outcome.kind.to_string(),
                status: outcome.status.to_string(),
            })
            .inc();

        self.record_check_duration(outcome.kind.as_str(), outcome.duration);
    }

    fn record_check_duration(&self, kind: &str, duration: Duration) {
        self.check_duration_seconds
            .get_or_create(&KindLabels {
                kind: kind.to_string(),
            })
            .observe(duration.as_secs_f64());
    }

    /// Record a sweep that never started
    pub fn record_snapshot_failure(&self) {
        self.snapshot_failures_total.inc();
    }

    /// Prometheus text exposition of every metric
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
