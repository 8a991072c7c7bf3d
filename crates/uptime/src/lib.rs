//! Uptime monitoring for HTTP, TCP and ICMP services.
//!
//! The crate keeps a registry of services and an append-only log of
//! up/down observations, and sweeps every registered service on a fixed
//! interval:
//! - HTTP checks: status 2xx or 3xx within the timeout, up to 10 redirects followed
//! - TCP checks: a connection completes within the timeout
//! - PING checks: one echo request through the platform `ping` utility
//!
//! Each sweep snapshots the registry, launches one concurrent check per
//! service and returns immediately. A hung target only delays its own
//! observation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use uptime::{CheckerSet, CheckerSettings, NewService, Scheduler, ServiceRegistry, SqliteStore, Sweeper};
//!
//! # async fn example() -> common::Result<()> {
//! let store = Arc::new(SqliteStore::open("uptime.db").await?);
//! store.add(NewService::new("api", "http", "https://example.com/health")).await?;
//!
//! let checkers = CheckerSet::standard(&CheckerSettings::default())?;
//! let scheduler = Scheduler::new(Sweeper::new(store, checkers), Duration::from_secs(60));
//! let task = scheduler.start();
//!
//! // ...
//! scheduler.stop();
//! # let _ = task.await;
//! # Ok(())
//! # }
//! ```

pub mod checkers;
pub mod scheduler;
pub mod store;
pub mod sweep;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use checkers::{Checker, CheckerSet, HttpChecker, PingChecker, TcpChecker};
pub use scheduler::{Scheduler, SweepEvent};
pub use store::{MAX_RECENT, MemoryStore, ObservationStore, ServiceRegistry, SqliteStore, Store};
pub use sweep::{CheckOutcome, SweepHandle, SweepReport, Sweeper, WriteOutcome};
pub use types::{
    CheckerSettings, MonitoredService, NewObservation, NewService, Observation, ProbeResult,
    ProbeStatus, ServiceDefinition, ServiceId, ServiceKind,
};
