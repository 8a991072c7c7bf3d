//! Uptime server: store, scheduler, reporter and API wired together.

use crate::api::{ApiServer, AppState};
use crate::metrics::MetricsRegistry;
use crate::reporter::Reporter;
use crate::types::ServerConfig;
use common::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uptime::{CheckerSet, Scheduler, SqliteStore, Store, SweepEvent, Sweeper};

/// Uptime server
pub struct UptimeServer {
    config: ServerConfig,
}

impl UptimeServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Open the configured SQLite store and run.
    ///
    /// Failing to open the store is fatal.
    pub async fn run(self) -> Result<()> {
        let store = SqliteStore::connect(
            &self.config.database_url,
            self.config.database_max_connections,
            self.config.database_busy_timeout,
        )
        .await?;

        self.run_with_store(Arc::new(store)).await
    }

    /// Run against an already opened store until a task exits or Ctrl-C
    pub async fn run_with_store(self, store: Arc<dyn Store>) -> Result<()> {
        info!("Starting uptime server");

        let metrics = if self.config.metrics_enabled {
            info!("Metrics enabled on {}/metrics", self.config.listen_addr);
            Some(Arc::new(MetricsRegistry::new()))
        } else {
            info!("Metrics disabled");
            None
        };

        let (events_tx, events_rx) = mpsc::channel::<SweepEvent>(self.config.report_channel_size);

        let checkers = CheckerSet::standard(&self.config.checkers)?;
        let sweeper = Sweeper::new(store.clone(), checkers)
            .with_snapshot_timeout(self.config.snapshot_timeout);
        let scheduler = Scheduler::new(sweeper, self.config.sweep_interval)
            .sweep_on_start(self.config.sweep_on_start)
            .with_events(events_tx);

        let reporter = Reporter::new(events_rx, metrics.clone());
        let api = ApiServer::new(
            AppState::new(store, metrics),
            self.config.listen_addr.clone(),
        );

        let scheduler_handle = scheduler.start();
        let reporter_handle = tokio::spawn(reporter.run());
        let api_handle = tokio::spawn(api.run());

        info!("All tasks spawned, server running");

        let result = tokio::select! {
            res = api_handle => match res {
                Ok(Ok(())) => {
                    info!("API server completed");
                    Ok(())
                }
                Ok(Err(e)) => Err(e),
                Err(e) => Err(Error::other(format!("API task failed: {}", e))),
            },
            res = scheduler_handle => {
                warn!("Scheduler task exited");
                res.map_err(|e| Error::other(format!("scheduler task failed: {}", e)))
            }
            _ = reporter_handle => {
                warn!("Reporter task exited");
                Ok(())
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                Ok(())
            }
        };

        scheduler.stop();
        info!("Uptime server stopped");
        result
    }
}
