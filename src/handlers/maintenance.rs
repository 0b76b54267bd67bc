use axum::{extract::State, response::Json};
use serde_json::json;
use tracing::info;

use super::Operator;
use crate::{services::artifacts::CleanupReport, ApiResponse, ApiResult, AppState};

/// Runs the artifact retention sweep on demand.
pub async fn cleanup_artifacts(
    State(state): State<AppState>,
    operator: Operator,
) -> ApiResult<CleanupReport> {
    let report = state.services.artifacts.cleanup_expired().await;
    info!(
        removed_files = report.removed_files,
        removed_dirs = report.removed_dirs,
        "artifact retention sweep finished"
    );
    state
        .services
        .audit
        .info(
            "Artifact retention sweep",
            json!({
                "removed_files": report.removed_files,
                "removed_dirs": report.removed_dirs,
            }),
            operator.as_deref(),
        )
        .await;
    Ok(Json(ApiResponse::success(report)))
}
