use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;

use super::{paginate, Operator, PageQuery};
use crate::{
    errors::ServiceError,
    models::{orm_request, OrmStatus},
    services::orm::{OrmForm, OrmOutcome},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Default)]
pub struct OrmListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrmRequest {
    pub reservation_number: String,
    #[serde(flatten)]
    pub form: OrmForm,
}

pub async fn list_orm_requests(
    State(state): State<AppState>,
    Query(query): Query<OrmListQuery>,
) -> ApiResult<PaginatedResponse<orm_request::Model>> {
    let (page, limit) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);

    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<OrmStatus>().map_err(ServiceError::ValidationError)?),
    };

    let (items, total) = state.services.orm.list(status, page, limit).await?;
    Ok(Json(ApiResponse::success(paginate(items, total, page, limit))))
}

pub async fn get_orm_request(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<orm_request::Model> {
    let request = state.services.orm.get(id).await?;
    Ok(Json(ApiResponse::success(request)))
}

pub async fn create_orm_request(
    State(state): State<AppState>,
    operator: Operator,
    Json(form): Json<OrmForm>,
) -> ApiResult<OrmOutcome> {
    let outcome = state
        .services
        .orm
        .create_orm(&form, operator.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn update_orm_request(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    operator: Operator,
    Json(payload): Json<UpdateOrmRequest>,
) -> ApiResult<OrmOutcome> {
    let outcome = state
        .services
        .orm
        .update_orm(
            id,
            &payload.reservation_number,
            &payload.form,
            operator.as_deref(),
        )
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn cancel_orm_request(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    operator: Operator,
) -> ApiResult<orm_request::Model> {
    let request = state
        .services
        .orm
        .cancel_orm(id, operator.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(request)))
}

pub async fn sync_orm_request(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<orm_request::Model> {
    let request = state.services.orm.sync_orm(id).await?;
    Ok(Json(ApiResponse::success(request)))
}
