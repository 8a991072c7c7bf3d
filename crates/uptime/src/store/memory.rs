//! In-process store with the same semantics as the SQLite backend.

use super::{ObservationStore, ServiceRegistry, clamp_limit};
use crate::types::{
    MonitoredService, NewObservation, Observation, ObservationId, ServiceDefinition, ServiceId,
};
use async_trait::async_trait;
use common::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    services: BTreeMap<ServiceId, MonitoredService>,
    observations: Vec<Observation>,
    last_service_id: ServiceId,
    last_observation_id: ObservationId,
}

/// Store kept entirely in memory. Ids are allocated monotonically and never
/// reused, like `AUTOINCREMENT`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `services` exactly as given, kinds unchecked.
    ///
    /// Useful for reproducing rows written by older or foreign tools.
    pub fn with_services(services: Vec<MonitoredService>) -> Self {
        let last_service_id = services.iter().map(|s| s.id).max().unwrap_or(0);
        let services = services.into_iter().map(|s| (s.id, s)).collect();

        Self {
            inner: Mutex::new(Inner {
                services,
                last_service_id,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::storage("memory store lock poisoned"))
    }
}

#[async_trait]
impl ServiceRegistry for MemoryStore {
    async fn list(&self) -> Result<Vec<MonitoredService>> {
        Ok(self.lock()?.services.values().cloned().collect())
    }

    async fn insert(&self, service: ServiceDefinition) -> Result<ServiceId> {
        let mut inner = self.lock()?;
        inner.last_service_id += 1;
        let id = inner.last_service_id;

        inner.services.insert(
            id,
            MonitoredService {
                id,
                name: service.name,
                kind: service.kind.as_str().to_string(),
                target: service.target,
            },
        );
        Ok(id)
    }

    async fn remove(&self, id: ServiceId) -> Result<()> {
        let mut inner = self.lock()?;
        inner.observations.retain(|o| o.service_id != id);
        inner.services.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn append(&self, observation: NewObservation) -> Result<Option<Observation>> {
        let mut inner = self.lock()?;
        if !inner.services.contains_key(&observation.service_id) {
            return Ok(None);
        }

        inner.last_observation_id += 1;
        let stored = Observation {
            id: inner.last_observation_id,
            service_id: observation.service_id,
            up: observation.up,
            checked_at: observation.checked_at,
        };
        inner.observations.push(stored.clone());
        Ok(Some(stored))
    }

    async fn recent_for(&self, service_id: ServiceId, limit: usize) -> Result<Vec<Observation>> {
        let inner = self.lock()?;
        let mut recent: Vec<Observation> = inner
            .observations
            .iter()
            .filter(|o| o.service_id == service_id)
            .cloned()
            .collect();

        recent.sort_by(|a, b| b.checked_at.cmp(&a.checked_at).then(b.id.cmp(&a.id)));
        recent.truncate(clamp_limit(limit));
        Ok(recent)
    }
}
