//! Service registry and observation log.
//!
//! Both halves live behind traits so the sweep, the API and tests can share
//! one injected handle ([`Store`]) regardless of backend.
//!
//! Removal cascades: deleting a service deletes its observations, and an
//! append for a service that no longer exists writes nothing. The log
//! therefore never holds rows that no service can reach.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::types::{
    MonitoredService, NewObservation, NewService, Observation, ServiceDefinition, ServiceId,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use common::{Error, Result};

/// Upper bound on a recent-window query
pub const MAX_RECENT: usize = 100;

/// Registered services
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Snapshot of all services, ascending id
    async fn list(&self) -> Result<Vec<MonitoredService>>;

    /// Store an already validated service and return its new id
    async fn insert(&self, service: ServiceDefinition) -> Result<ServiceId>;

    /// Remove a service and its observations. Unknown ids are a no-op.
    async fn remove(&self, id: ServiceId) -> Result<()>;

    /// Validate and register a service
    async fn add(&self, service: NewService) -> Result<ServiceId> {
        let definition = service.validate()?;
        self.insert(definition).await
    }
}

/// Append-only observation log
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Append one observation.
    ///
    /// Returns `None` when the service was removed before the write; nothing
    /// is stored in that case.
    async fn append(&self, observation: NewObservation) -> Result<Option<Observation>>;

    /// Newest first, at most `min(limit, MAX_RECENT)` entries. Unknown ids
    /// yield an empty list.
    async fn recent_for(&self, service_id: ServiceId, limit: usize) -> Result<Vec<Observation>>;
}

/// Registry plus observation log, shared by the sweep and the API
pub trait Store: ServiceRegistry + ObservationStore {}

impl<T: ServiceRegistry + ObservationStore + ?Sized> Store for T {}

/// Text form used for `checked_at` columns.
///
/// Fixed-width nanoseconds in UTC, so lexical order equals time order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::storage(format!("invalid checked_at {:?}: {}", raw, e)))
}

pub(crate) fn clamp_limit(limit: usize) -> usize {
    limit.min(MAX_RECENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_round_trip() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let text = format_timestamp(&ts);
        assert_eq!(text, "2023-11-14T22:13:20.123456789Z");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn test_timestamp_text_orders_like_time() {
        let earlier = Utc.timestamp_opt(1_700_000_000, 900_000_000).unwrap();
        let later = Utc.timestamp_opt(1_700_000_001, 0).unwrap();
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
    }

    #[test]
    fn test_offset_timestamps_normalize_to_utc() {
        let parsed = parse_timestamp("2024-01-01T02:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(5), 5);
        assert_eq!(clamp_limit(100), 100);
        assert_eq!(clamp_limit(1000), 100);
    }
}
