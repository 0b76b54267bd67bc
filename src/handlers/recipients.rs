use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::{
    models::saved_recipient,
    services::recipients::RecipientInput,
    ApiResponse, ApiResult, AppState,
};

pub async fn list_recipients(
    State(state): State<AppState>,
) -> ApiResult<Vec<saved_recipient::Model>> {
    let recipients = state.services.recipients.list().await?;
    Ok(Json(ApiResponse::success(recipients)))
}

/// Creates the entry or overwrites the one with the same label.
pub async fn upsert_recipient(
    State(state): State<AppState>,
    Json(input): Json<RecipientInput>,
) -> ApiResult<saved_recipient::Model> {
    let saved = state.services.recipients.upsert(input).await?;
    Ok(Json(ApiResponse::success(saved)))
}

pub async fn delete_recipient(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<i32> {
    state.services.recipients.delete(id).await?;
    Ok(Json(ApiResponse::success(id)))
}
