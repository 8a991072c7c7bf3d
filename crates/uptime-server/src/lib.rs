//! Uptime monitor server.
//!
//! Runs the periodic sweep over the service registry and serves the HTTP API
//! on top of the `uptime` crate.
//!
//! # Components
//!
//! - **Scheduler**: sweeps every registered service on a fixed interval
//! - **Reporter**: turns sweep events into log lines and Prometheus metrics
//! - **API**: registers and removes services, serves recent uptime
//!
//! Routes:
//! - `GET /api/services`, `POST /api/services`, `DELETE /api/services?id=`
//! - `GET /api/uptime?service_id=`
//! - `GET /metrics` (when enabled)

pub mod api;
pub mod config;
pub mod metrics;
pub mod reporter;
pub mod server;
pub mod telemetry;
pub mod types;

pub use api::{ApiServer, AppState, router};
pub use config::{Config, ConfigError};
pub use metrics::MetricsRegistry;
pub use reporter::Reporter;
pub use server::UptimeServer;
pub use telemetry::{TelemetryGuard, setup_tracing};
pub use types::ServerConfig;
