use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use serde::Deserialize;
use validator::Validate;

use super::{file_response, paginate, Operator, PageQuery};
use crate::{
    errors::ServiceError,
    services::manifests::{ManifestOutcome, ManifestView},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateManifestRequest {
    #[validate(length(min = 1, message = "Select at least one shipment"))]
    pub shipment_ids: Vec<i32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ManifestDocumentQuery {
    /// `official` for the carrier's document, the local PDF otherwise
    pub kind: Option<String>,
}

pub async fn generate_manifest(
    State(state): State<AppState>,
    operator: Operator,
    Json(payload): Json<GenerateManifestRequest>,
) -> ApiResult<ManifestOutcome> {
    payload.validate()?;
    let outcome = state
        .services
        .manifests
        .generate_manifest_for_shipments(&payload.shipment_ids, operator.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn list_manifests(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<PaginatedResponse<ManifestView>> {
    let (page, limit) = query.resolve(&state.config);
    let (items, total) = state.services.manifests.list(page, limit).await?;
    Ok(Json(ApiResponse::success(paginate(items, total, page, limit))))
}

pub async fn get_manifest(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<ManifestView> {
    let view = state.services.manifests.get(id).await?;
    Ok(Json(ApiResponse::success(view)))
}

pub async fn download_manifest(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<ManifestDocumentQuery>,
) -> Result<Response, ServiceError> {
    let view = state.services.manifests.get(id).await?;
    let official = query
        .kind
        .as_deref()
        .is_some_and(|kind| kind.eq_ignore_ascii_case("official"));
    let relative = if official {
        view.manifest.official_pdf_path
    } else {
        view.manifest.pdf_path
    }
    .ok_or_else(|| ServiceError::NotFound(format!("manifest {} has no such document", id)))?;

    if !state.services.artifacts.exists(&relative).await {
        return Err(ServiceError::NotFound(format!(
            "document file of manifest {} is missing",
            id
        )));
    }
    let path = state.services.artifacts.absolute(&relative)?;
    file_response(&path).await
}
