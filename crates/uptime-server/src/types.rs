//! Server configuration and HTTP API payload types.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uptime::{CheckerSettings, ServiceId};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP API binds to
    pub listen_addr: String,

    /// SQLite connection URL
    pub database_url: String,

    /// Pool size for the store
    pub database_max_connections: u32,

    /// How long a write waits on a locked database
    pub database_busy_timeout: Duration,

    /// Time between sweeps
    pub sweep_interval: Duration,

    /// Deadline for reading the registry at the start of a sweep
    pub snapshot_timeout: Duration,

    /// Sweep once immediately at startup
    pub sweep_on_start: bool,

    /// Sweep event channel buffer size
    pub report_channel_size: usize,

    /// Per-protocol checker settings
    pub checkers: CheckerSettings,

    /// Serve `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            database_url: "sqlite://uptime.db".to_string(),
            database_max_connections: 8,
            database_busy_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(60),
            snapshot_timeout: Duration::from_secs(10),
            sweep_on_start: false,
            report_channel_size: 64,
            checkers: CheckerSettings::default(),
            metrics_enabled: true,
        }
    }
}

/// Query string of `DELETE /api/services`.
///
/// Kept as raw text so a missing or non-numeric id can be reported the same
/// way.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteServiceParams {
    pub id: Option<String>,
}

/// Query string of `GET /api/uptime`
#[derive(Debug, Default, Deserialize)]
pub struct UptimeParams {
    pub service_id: Option<String>,
    pub limit: Option<String>,
}

/// Body returned by `POST /api/services`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedService {
    pub id: ServiceId,
}

/// Body of every 4xx/5xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
