//! HTTP status and control surface

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::orchestrator::{MonitorOrchestrator, MonitorStatus, StartOutcome, StopOutcome};

/// Shared application state
pub struct AppState {
    pub orchestrator: Arc<MonitorOrchestrator>,
    /// Application start time
    pub started_at: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Uptime in seconds
    pub uptime_seconds: i64,
    pub monitor: MonitorStatus,
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: uptime,
        monitor: state.orchestrator.status(),
    })
}

/// GET /api/v1/monitor/status
pub async fn monitor_status(State(state): State<Arc<AppState>>) -> Json<MonitorStatus> {
    Json(state.orchestrator.status())
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub status: &'static str,
}

/// POST /api/v1/monitor/start
pub async fn monitor_start(State(state): State<Arc<AppState>>) -> Json<ControlResponse> {
    let status = match state.orchestrator.start() {
        StartOutcome::Started => "started",
        StartOutcome::AlreadyRunning => "already_running",
    };
    Json(ControlResponse { status })
}

/// POST /api/v1/monitor/stop
pub async fn monitor_stop(State(state): State<Arc<AppState>>) -> Json<ControlResponse> {
    let status = match state.orchestrator.stop().await {
        StopOutcome::Stopped => "stopped",
        StopOutcome::NotRunning => "not_running",
    };
    Json(ControlResponse { status })
}
