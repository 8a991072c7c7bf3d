//! Periodic sweep driver.

use crate::sweep::{SweepReport, Sweeper};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Reported once per sweep, after its checks have finished
#[derive(Debug, Clone)]
pub enum SweepEvent {
    /// Every launched check finished or was aborted
    Completed(SweepReport),
    /// The registry snapshot failed; no checks were launched
    SnapshotFailed { error: String },
}

/// Runs a sweep every `interval` until stopped.
///
/// A tick only launches checks. Completion is awaited on a separate task, so
/// a slow sweep never delays the next tick and sweeps may overlap.
pub struct Scheduler {
    sweeper: Arc<Sweeper>,
    interval: Duration,
    sweep_on_start: bool,
    events_tx: Option<mpsc::Sender<SweepEvent>>,
    stop_signal: Arc<Notify>,
}

impl Scheduler {
    pub fn new(sweeper: Sweeper, interval: Duration) -> Self {
        Self {
            sweeper: Arc::new(sweeper),
            interval,
            sweep_on_start: false,
            events_tx: None,
            stop_signal: Arc::new(Notify::new()),
        }
    }

    /// Send a [`SweepEvent`] for every sweep. Events are dropped when the
    /// channel is full.
    pub fn with_events(mut self, events_tx: mpsc::Sender<SweepEvent>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    /// Sweep immediately instead of waiting one full interval
    pub fn sweep_on_start(mut self, enabled: bool) -> Self {
        self.sweep_on_start = enabled;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the tick loop
    pub fn start(&self) -> JoinHandle<()> {
        let sweeper = self.sweeper.clone();
        let events_tx = self.events_tx.clone();
        let stop_signal = self.stop_signal.clone();
        let period = self.interval;
        let sweep_on_start = self.sweep_on_start;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            if !sweep_on_start {
                ticker.tick().await;
            }

            info!(interval = ?period, "Scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        Self::tick(&sweeper, events_tx.as_ref()).await;
                    }
                    _ = stop_signal.notified() => {
                        info!("Scheduler stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Stop the tick loop. Checks already launched run to completion.
    pub fn stop(&self) {
        self.stop_signal.notify_one();
    }

    async fn tick(sweeper: &Sweeper, events_tx: Option<&mpsc::Sender<SweepEvent>>) {
        match sweeper.launch().await {
            Ok(handle) => {
                debug!(launched = handle.launched(), "Sweep started");
                let events_tx = events_tx.cloned();
                tokio::spawn(async move {
                    let report = handle.wait().await;
                    debug!(
                        written = report.written(),
                        up = report.up(),
                        down = report.down(),
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "Sweep finished"
                    );
                    if let Some(tx) = events_tx {
                        if tx.try_send(SweepEvent::Completed(report)).is_err() {
                            debug!("Sweep event not delivered");
                        }
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "Sweep skipped, registry snapshot failed");
                if let Some(tx) = events_tx {
                    if tx
                        .try_send(SweepEvent::SnapshotFailed {
                            error: e.to_string(),
                        })
                        .is_err()
                    {
                        debug!("Sweep event not delivered");
                    }
                }
            }
        }
    }
}
