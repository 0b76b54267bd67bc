use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;

use super::{paginate, PageQuery};
use crate::{models::log_entry, ApiResponse, ApiResult, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, Default)]
pub struct LogListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// `info`, `warning` or `error`
    pub level: Option<String>,
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogListQuery>,
) -> ApiResult<PaginatedResponse<log_entry::Model>> {
    let (page, limit) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);
    let level = query
        .level
        .as_deref()
        .map(str::trim)
        .filter(|level| !level.is_empty());

    let (items, total) = state.services.audit.list(level, page, limit).await?;
    Ok(Json(ApiResponse::success(paginate(items, total, page, limit))))
}
