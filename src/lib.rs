//! BRT back-office library
//!
//! Shipments, pickup requests, customs paperwork, manifests and ledger entries
//! for a sender account of the BRT courier network.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod carrier;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod services;
pub mod tracing;

use axum::{
    response::Json,
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn shipment_service(&self) -> Arc<services::shipments::ShipmentService> {
        self.services.shipments.clone()
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1/brt`.
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{logs, maintenance, manifests, orm, pudo, recipients, shipments};

    let shipment_routes = Router::new()
        .route(
            "/shipments",
            get(shipments::list_shipments).post(shipments::create_shipment),
        )
        .route("/shipments/next-reference", get(shipments::next_reference))
        .route("/shipments/routing-quote", post(shipments::routing_quote))
        .route(
            "/shipments/:id",
            get(shipments::get_shipment)
                .put(shipments::update_shipment)
                .delete(shipments::delete_shipment),
        )
        .route("/shipments/:id/confirm", post(shipments::confirm_shipment))
        .route("/shipments/:id/cancel", post(shipments::cancel_shipment))
        .route("/shipments/:id/tracking", post(shipments::refresh_tracking))
        .route("/shipments/:id/reprint", post(shipments::reprint_label))
        .route("/shipments/:id/label", get(shipments::download_label));

    let manifest_routes = Router::new()
        .route(
            "/manifests",
            get(manifests::list_manifests).post(manifests::generate_manifest),
        )
        .route("/manifests/:id", get(manifests::get_manifest))
        .route("/manifests/:id/document", get(manifests::download_manifest));

    let orm_routes = Router::new()
        .route(
            "/orm",
            get(orm::list_orm_requests).post(orm::create_orm_request),
        )
        .route(
            "/orm/:id",
            get(orm::get_orm_request).put(orm::update_orm_request),
        )
        .route("/orm/:id/cancel", post(orm::cancel_orm_request))
        .route("/orm/:id/sync", post(orm::sync_orm_request));

    let misc_routes = Router::new()
        .route(
            "/recipients",
            get(recipients::list_recipients).post(recipients::upsert_recipient),
        )
        .route("/recipients/:id", delete(recipients::delete_recipient))
        .route("/pudo", get(pudo::search_pudo))
        .route("/logs", get(logs::list_logs))
        .route("/maintenance/cleanup", post(maintenance::cleanup_artifacts));

    Router::new()
        .merge(shipment_routes)
        .merge(manifest_routes)
        .merge(orm_routes)
        .merge(misc_routes)
}

/// Full application router with health probes and request middleware.
/// CORS is left to the binary.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "brt-backoffice up" }))
        .merge(handlers::health::health_routes())
        .nest("/api/v1/brt", api_v1_routes())
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            crate::tracing::request_logging_middleware,
        ))
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
        .with_state(state)
}

pub mod prelude {
    pub use crate::carrier::{CarrierError, Carriers};
    pub use crate::config::AppConfig;
    pub use crate::errors::*;
    pub use crate::services::*;
    pub use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};
}
