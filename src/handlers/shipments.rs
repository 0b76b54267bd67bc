use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{file_response, paginate, Operator, PageQuery};
use crate::{
    carrier::RoutingResponse,
    errors::ServiceError,
    models::{shipment, ShipmentStatus},
    services::{
        shipment_form::ShipmentForm,
        shipment_store::ShipmentFilter,
        shipments::{Notice, ShipmentOutcome},
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Default)]
pub struct ShipmentListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
    /// Only shipments not yet part of a manifest
    #[serde(default)]
    pub unmanifested: bool,
}

#[derive(Debug, Serialize)]
pub struct NextReference {
    pub sender_customer_code: String,
    pub numeric_reference: i64,
}

#[derive(Debug, Serialize)]
pub struct DeletedShipment {
    pub id: i32,
    pub notices: Vec<Notice>,
}

pub async fn list_shipments(
    State(state): State<AppState>,
    Query(query): Query<ShipmentListQuery>,
) -> ApiResult<PaginatedResponse<shipment::Model>> {
    let (page, limit) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);

    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<ShipmentStatus>()
                .map_err(ServiceError::ValidationError)?,
        ),
    };
    let filter = ShipmentFilter {
        status,
        unmanifested: query.unmanifested,
    };

    let (items, total) = state
        .shipment_service()
        .list(&filter, page, limit)
        .await?;

    Ok(Json(ApiResponse::success(paginate(items, total, page, limit))))
}

pub async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<shipment::Model> {
    let shipment = state.shipment_service().get(id).await?;
    Ok(Json(ApiResponse::success(shipment)))
}

pub async fn create_shipment(
    State(state): State<AppState>,
    operator: Operator,
    Json(form): Json<ShipmentForm>,
) -> ApiResult<ShipmentOutcome> {
    let outcome = state
        .shipment_service()
        .create_shipment(&form, operator.as_deref())
        .await?;
    info!(shipment_id = outcome.shipment.id, "shipment created via API");
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn update_shipment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    operator: Operator,
    Json(form): Json<ShipmentForm>,
) -> ApiResult<ShipmentOutcome> {
    let outcome = state
        .shipment_service()
        .edit_shipment(id, &form, operator.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn delete_shipment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    operator: Operator,
) -> ApiResult<DeletedShipment> {
    let notices = state
        .shipment_service()
        .delete_shipment(id, operator.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(DeletedShipment { id, notices })))
}

pub async fn confirm_shipment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    operator: Operator,
) -> ApiResult<ShipmentOutcome> {
    let outcome = state
        .shipment_service()
        .confirm_shipment(id, operator.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn cancel_shipment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    operator: Operator,
) -> ApiResult<ShipmentOutcome> {
    let outcome = state
        .shipment_service()
        .cancel_shipment(id, operator.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn refresh_tracking(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<shipment::Model> {
    let shipment = state.shipment_service().refresh_tracking(id).await?;
    Ok(Json(ApiResponse::success(shipment)))
}

pub async fn reprint_label(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    operator: Operator,
) -> ApiResult<ShipmentOutcome> {
    let outcome = state
        .shipment_service()
        .reprint_label(id, operator.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Streams the stored label file.
pub async fn download_label(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    let path = state.shipment_service().label_file(id).await?;
    file_response(&path).await
}

pub async fn next_reference(State(state): State<AppState>) -> ApiResult<NextReference> {
    let numeric_reference = state.shipment_service().prefill_reference().await?;
    Ok(Json(ApiResponse::success(NextReference {
        sender_customer_code: state.config.brt.sender_customer_code.clone(),
        numeric_reference,
    })))
}

pub async fn routing_quote(
    State(state): State<AppState>,
    Json(form): Json<ShipmentForm>,
) -> ApiResult<RoutingResponse> {
    let quote = state.shipment_service().routing_quote(&form).await?;
    Ok(Json(ApiResponse::success(quote)))
}
