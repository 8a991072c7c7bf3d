//! HTTP API: service registry, uptime history and the Prometheus endpoint.

use crate::metrics::MetricsRegistry;
use crate::types::{CreatedService, DeleteServiceParams, ErrorBody, UptimeParams};
use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uptime::{
    MAX_RECENT, MonitoredService, NewService, Observation, ObservationStore, ServiceId,
    ServiceRegistry, Store,
};

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub metrics: Option<Arc<MetricsRegistry>>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        Self { store, metrics }
    }
}

/// Error returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    /// Caller input rejected (400)
    BadRequest(String),
    /// Store or encoding failure (500)
    Internal(String),
}

impl From<common::Error> for ApiError {
    fn from(err: common::Error) -> Self {
        if err.is_validation() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => {
                warn!(error = %message, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Build the router. `/metrics` is only mounted when metrics are enabled.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route(
            "/api/services",
            get(list_services).post(create_service).delete(delete_service),
        )
        .route("/api/uptime", get(recent_uptime));

    if state.metrics.is_some() {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// HTTP server for the API
pub struct ApiServer {
    state: AppState,
    listen_addr: String,
}

impl ApiServer {
    pub fn new(state: AppState, listen_addr: String) -> Self {
        Self { state, listen_addr }
    }

    /// Bind and serve until the listener fails
    pub async fn run(self) -> common::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(listen_addr = %self.listen_addr, "API server listening");

        axum::serve(listener, router(self.state)).await?;
        Ok(())
    }
}

async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<Vec<MonitoredService>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

async fn create_service(
    State(state): State<AppState>,
    payload: Result<Json<NewService>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedService>), ApiError> {
    let Json(service) = payload?;
    let id = state.store.add(service).await?;
    debug!(service_id = id, "Service registered via API");
    Ok((StatusCode::CREATED, Json(CreatedService { id })))
}

async fn delete_service(
    State(state): State<AppState>,
    Query(params): Query<DeleteServiceParams>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id("id", params.id.as_deref())?;
    state.store.remove(id).await?;
    debug!(service_id = id, "Service removed via API");
    Ok(StatusCode::NO_CONTENT)
}

async fn recent_uptime(
    State(state): State<AppState>,
    Query(params): Query<UptimeParams>,
) -> Result<Json<Vec<Observation>>, ApiError> {
    let service_id = parse_id("service_id", params.service_id.as_deref())?;
    let limit = match params.limit.as_deref() {
        None => MAX_RECENT,
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ApiError::BadRequest(format!("invalid limit: {:?}", raw)))?,
    };

    Ok(Json(state.store.recent_for(service_id, limit).await?))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let Some(ref metrics) = state.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match metrics.encode() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            buffer,
        )
            .into_response(),
        Err(e) => ApiError::Internal(format!("failed to encode metrics: {}", e)).into_response(),
    }
}

fn parse_id(name: &str, raw: Option<&str>) -> Result<ServiceId, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing {}", name)))?;

    raw.parse::<ServiceId>()
        .map_err(|_| ApiError::BadRequest(format!("{} must be an integer: {:?}", name, raw)))
}
