//! Fakes shared by the unit tests.

use crate::checkers::{Checker, CheckerSet};
use crate::store::{ObservationStore, ServiceRegistry};
use crate::types::{
    MonitoredService, NewObservation, Observation, ProbeResult, ServiceDefinition, ServiceId,
    ServiceKind,
};
use async_trait::async_trait;
use common::{Error, Result};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Checker with a fixed verdict, optionally held until a permit is released
pub struct FakeChecker {
    kind: ServiceKind,
    up: bool,
    gate: Option<Arc<Semaphore>>,
}

impl FakeChecker {
    pub fn new(kind: ServiceKind, up: bool) -> Arc<Self> {
        Arc::new(Self {
            kind,
            up,
            gate: None,
        })
    }

    pub fn gated(kind: ServiceKind, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            up: true,
            gate: Some(gate),
        })
    }
}

#[async_trait]
impl Checker for FakeChecker {
    async fn probe(&self, _target: &str) -> ProbeResult {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }

        let duration = Duration::from_millis(1);
        if self.up {
            ProbeResult::up(duration)
        } else {
            ProbeResult::down(duration, "fake down")
        }
    }

    fn kind(&self) -> ServiceKind {
        self.kind
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

mock! {
    pub Backend {}

    #[async_trait]
    impl ServiceRegistry for Backend {
        async fn list(&self) -> Result<Vec<MonitoredService>>;
        async fn insert(&self, service: ServiceDefinition) -> Result<ServiceId>;
        async fn remove(&self, id: ServiceId) -> Result<()>;
    }

    #[async_trait]
    impl ObservationStore for Backend {
        async fn append(&self, observation: NewObservation) -> Result<Option<Observation>>;
        async fn recent_for(&self, service_id: ServiceId, limit: usize) -> Result<Vec<Observation>>;
    }
}

/// Store whose snapshot never returns
pub struct StalledStore;

#[async_trait]
impl ServiceRegistry for StalledStore {
    async fn list(&self) -> Result<Vec<MonitoredService>> {
        std::future::pending().await
    }

    async fn insert(&self, _service: ServiceDefinition) -> Result<ServiceId> {
        Err(Error::storage("stalled"))
    }

    async fn remove(&self, _id: ServiceId) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ObservationStore for StalledStore {
    async fn append(&self, _observation: NewObservation) -> Result<Option<Observation>> {
        Ok(None)
    }

    async fn recent_for(&self, _service_id: ServiceId, _limit: usize) -> Result<Vec<Observation>> {
        Ok(Vec::new())
    }
}

/// Registry row as it would come back from a snapshot
pub fn service(id: ServiceId, kind: &str) -> MonitoredService {
    MonitoredService {
        id,
        name: format!("svc-{}", id),
        kind: kind.to_string(),
        target: "127.0.0.1:1".to_string(),
    }
}

/// http and ping report up, tcp reports down
pub fn fake_checkers() -> CheckerSet {
    CheckerSet::new()
        .with_checker(FakeChecker::new(ServiceKind::Http, true))
        .with_checker(FakeChecker::new(ServiceKind::Tcp, false))
        .with_checker(FakeChecker::new(ServiceKind::Ping, true))
}
