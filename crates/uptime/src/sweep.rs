//! One sweep: snapshot the registry and launch one check per service.

use crate::checkers::{Checker, CheckerSet};
use crate::store::Store;
use crate::types::{MonitoredService, NewObservation, ProbeStatus, ServiceId, ServiceKind};
use common::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};

/// What happened to the observation of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Observation stored
    Written,
    /// Service was removed while the check ran; nothing stored
    Discarded,
    /// Store rejected the write
    Failed,
}

/// Result of one check task
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub service_id: ServiceId,
    pub kind: ServiceKind,
    pub status: ProbeStatus,
    pub duration: Duration,
    pub write: WriteOutcome,
}

impl CheckOutcome {
    pub fn is_up(&self) -> bool {
        self.status == ProbeStatus::Up
    }
}

/// Summary of a completed sweep
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Checks launched
    pub launched: usize,
    /// Services skipped because their kind has no checker
    pub skipped: Vec<ServiceId>,
    /// One entry per check that ran to completion
    pub outcomes: Vec<CheckOutcome>,
    /// Check tasks that panicked or were aborted
    pub panicked: usize,
    /// Time from snapshot to last completed check
    pub elapsed: Duration,
}

impl SweepReport {
    pub fn up(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_up()).count()
    }

    pub fn down(&self) -> usize {
        self.outcomes.len() - self.up()
    }

    pub fn written(&self) -> usize {
        self.count_writes(WriteOutcome::Written)
    }

    pub fn discarded(&self) -> usize {
        self.count_writes(WriteOutcome::Discarded)
    }

    pub fn write_failures(&self) -> usize {
        self.count_writes(WriteOutcome::Failed)
    }

    fn count_writes(&self, outcome: WriteOutcome) -> usize {
        self.outcomes.iter().filter(|o| o.write == outcome).count()
    }
}

/// Checks launched by one sweep.
///
/// Dropping the handle aborts checks still in flight.
pub struct SweepHandle {
    tasks: JoinSet<CheckOutcome>,
    launched: usize,
    skipped: Vec<ServiceId>,
    started: Instant,
}

impl SweepHandle {
    pub fn launched(&self) -> usize {
        self.launched
    }

    pub fn skipped(&self) -> &[ServiceId] {
        &self.skipped
    }

    /// Wait for every check of this sweep to finish
    pub async fn wait(mut self) -> SweepReport {
        let mut outcomes = Vec::with_capacity(self.launched);
        let mut panicked = 0;

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(error = %e, "Check task did not complete");
                    panicked += 1;
                }
            }
        }

        SweepReport {
            launched: self.launched,
            skipped: std::mem::take(&mut self.skipped),
            outcomes,
            panicked,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Launches the checks of a sweep
pub struct Sweeper {
    store: Arc<dyn Store>,
    checkers: CheckerSet,
    snapshot_timeout: Duration,
}

impl Sweeper {
    pub fn new(store: Arc<dyn Store>, checkers: CheckerSet) -> Self {
        Self {
            store,
            checkers,
            snapshot_timeout: Duration::from_secs(10),
        }
    }

    /// Deadline for reading the registry snapshot
    pub fn with_snapshot_timeout(mut self, snapshot_timeout: Duration) -> Self {
        self.snapshot_timeout = snapshot_timeout;
        self
    }

    /// Snapshot the registry and spawn one check per recognized service.
    ///
    /// Returns as soon as every check is spawned. Fails only when the
    /// snapshot cannot be read, in which case nothing is launched.
    pub async fn launch(&self) -> Result<SweepHandle> {
        let started = Instant::now();

        let services = match timeout(self.snapshot_timeout, self.store.list()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::scheduler(format!(
                    "registry snapshot exceeded {:?}",
                    self.snapshot_timeout
                )));
            }
        };

        let mut tasks = JoinSet::new();
        let mut skipped = Vec::new();

        for service in services {
            let Some(checker) = self.checkers.for_service(&service) else {
                debug!(service_id = service.id, kind = %service.kind, "Skipping service without a checker");
                skipped.push(service.id);
                continue;
            };

            tasks.spawn(check_service(self.store.clone(), checker, service));
        }

        let launched = tasks.len();
        debug!(launched, skipped = skipped.len(), "Sweep launched");

        Ok(SweepHandle {
            tasks,
            launched,
            skipped,
            started,
        })
    }
}

async fn check_service(
    store: Arc<dyn Store>,
    checker: Arc<dyn Checker>,
    service: MonitoredService,
) -> CheckOutcome {
    let result = checker.probe(&service.target).await;

    if !result.is_up() {
        debug!(
            service_id = service.id,
            target = %service.target,
            status = %result.status,
            message = result.message.as_deref().unwrap_or(""),
            "Service down"
        );
    }

    let observation = NewObservation::now(service.id, result.is_up());
    let write = match store.append(observation).await {
        Ok(Some(_)) => WriteOutcome::Written,
        Ok(None) => {
            debug!(service_id = service.id, "Service removed during check, observation dropped");
            WriteOutcome::Discarded
        }
        Err(e) => {
            warn!(service_id = service.id, error = %e, "Failed to record observation");
            WriteOutcome::Failed
        }
    };

    CheckOutcome {
        service_id: service.id,
        kind: checker.kind(),
        status: result.status,
        duration: result.duration,
        write,
    }
}
