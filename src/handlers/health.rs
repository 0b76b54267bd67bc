use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;

use crate::AppState;

/// Component health status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub database: ComponentHealth,
    pub storage: ComponentHealth,
}

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness_check))
        .route("/health/ready", get(readiness_check))
}

/// Liveness probe: the process answers.
async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": env!("GIT_HASH"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Readiness probe: database reachable and uploads root present.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_start = Instant::now();
    let db_result = crate::db::check_connection(&state.db).await;
    let database = ComponentHealth {
        status: if db_result.is_ok() {
            ComponentStatus::Up
        } else {
            ComponentStatus::Down
        },
        message: db_result.map_or_else(
            |e| format!("Connection failed: {}", e),
            |_| "Connection successful".to_string(),
        ),
        latency_ms: Some(db_start.elapsed().as_millis() as u64),
    };

    let root = state.services.artifacts.root();
    let storage_ok = tokio::fs::metadata(root)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    let storage = ComponentHealth {
        status: if storage_ok {
            ComponentStatus::Up
        } else {
            ComponentStatus::Down
        },
        message: if storage_ok {
            "Uploads root available".to_string()
        } else {
            format!("Uploads root {} not found", root.display())
        },
        latency_ms: None,
    };

    // Only the database gates readiness
    let status = database.status;
    let status_code = match status {
        ComponentStatus::Up => StatusCode::OK,
        ComponentStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_secs: get_uptime_secs(),
            database,
            storage,
        }),
    )
}
