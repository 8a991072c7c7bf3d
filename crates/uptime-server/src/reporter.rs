//! Reporter for sweep events: logs summaries and feeds metrics.

use crate::metrics::MetricsRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uptime::{SweepEvent, SweepReport};

/// Consumes [`SweepEvent`]s from the scheduler
pub struct Reporter {
    /// Sweep event receiver
    events_rx: mpsc::Receiver<SweepEvent>,

    /// Metrics registry (optional)
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Reporter {
    pub fn new(events_rx: mpsc::Receiver<SweepEvent>, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        Self { events_rx, metrics }
    }

    /// Run until every sender is dropped
    pub async fn run(mut self) {
        info!("Reporter task started");

        while let Some(event) = self.events_rx.recv().await {
            self.handle(&event);
        }

        info!("Reporter task stopped, event channel closed");
    }

    fn handle(&self, event: &SweepEvent) {
        match event {
            SweepEvent::Completed(report) => {
                Self::log_report(report);
                if let Some(ref m) = self.metrics {
                    m.record_sweep(report);
                }
            }
            SweepEvent::SnapshotFailed { error } => {
                debug!(error = %error, "Recording failed sweep");
                if let Some(ref m) = self.metrics {
                    m.record_snapshot_failure();
                }
            }
        }
    }

    fn log_report(report: &SweepReport) {
        info!(
            launched = report.launched,
            up = report.up(),
            down = report.down(),
            skipped = report.skipped.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Sweep completed"
        );

        if report.write_failures() > 0 {
            warn!(
                write_failures = report.write_failures(),
                "Some observations could not be stored"
            );
        }
        if report.panicked > 0 {
            warn!(panicked = report.panicked, "Some checks did not complete");
        }
        if !report.skipped.is_empty() {
            debug!(service_ids = ?report.skipped, "Services with unrecognized kind skipped");
        }
    }
}
