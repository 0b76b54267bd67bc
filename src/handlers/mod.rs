pub mod health;
pub mod logs;
pub mod maintenance;
pub mod manifests;
pub mod orm;
pub mod pudo;
pub mod recipients;
pub mod shipments;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;

use crate::carrier::{Carriers, PudoApi};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::services::{
    artifacts::ArtifactStore,
    audit::AuditLog,
    customs::CustomsSynchronizer,
    documents::DocumentRenderer,
    financial::FinancialBridge,
    manifests::ManifestBuilder,
    orm::OrmService,
    recipients::RecipientService,
    references::{InMemoryReferenceSession, ReferenceAllocator},
    shipment_form::ShipmentFormProcessor,
    shipments::{ShipmentDependencies, ShipmentService},
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Header carrying the operator name recorded in audit entries.
pub const OPERATOR_HEADER: &str = "x-operator";

/// Services layer used by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub shipments: Arc<ShipmentService>,
    pub manifests: Arc<ManifestBuilder>,
    pub orm: Arc<OrmService>,
    pub recipients: Arc<RecipientService>,
    pub audit: Arc<AuditLog>,
    pub artifacts: Arc<ArtifactStore>,
    pub pudo: Arc<dyn PudoApi>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        carriers: Carriers,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        let artifacts = Arc::new(ArtifactStore::from_config(&config.storage));
        let financial = FinancialBridge::new(db_pool.clone(), config.pricing.clone());
        let recipients = RecipientService::new(db_pool.clone());
        let customs = CustomsSynchronizer::new(
            db_pool.clone(),
            artifacts.clone(),
            renderer.clone(),
            config.customs.clone(),
        );

        let shipments = ShipmentService::new(ShipmentDependencies {
            db: db_pool.clone(),
            carrier: carriers.shipments.clone(),
            tracking: carriers.tracking.clone(),
            allocator: ReferenceAllocator::new(Arc::new(InMemoryReferenceSession::new())),
            forms: ShipmentFormProcessor::new(
                config.brt.clone(),
                config.customs.clone(),
                config.pricing.clone(),
            ),
            artifacts: artifacts.clone(),
            customs,
            financial: financial.clone(),
            recipients: recipients.clone(),
            config: config.brt.clone(),
        });

        let manifests = ManifestBuilder::new(
            db_pool.clone(),
            carriers.shipments.clone(),
            carriers.manifests.clone(),
            artifacts.clone(),
            renderer,
            financial,
            config.manifest.clone(),
        );

        let orm = OrmService::new(
            db_pool.clone(),
            carriers.orm.clone(),
            config.brt.sender_customer_code.clone(),
        );

        Self {
            shipments: Arc::new(shipments),
            manifests: Arc::new(manifests),
            orm: Arc::new(orm),
            recipients: Arc::new(recipients),
            audit: Arc::new(AuditLog::new(db_pool)),
            artifacts,
            pudo: carriers.pudo,
        }
    }
}

/// Operator name taken from the `x-operator` header, if any.
#[derive(Debug, Clone, Default)]
pub struct Operator(pub Option<String>);

impl Operator {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Operator {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let name = parts
            .headers
            .get(OPERATOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| value.chars().take(100).collect());
        Ok(Operator(name))
    }
}

/// Common query parameters for list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    /// 1-based page and a limit clamped to the configured maximum.
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(config.api_default_page_size)
            .clamp(1, config.api_max_page_size.max(1));
        (page, limit)
    }
}

pub(crate) fn paginate<T>(
    items: Vec<T>,
    total: u64,
    page: u64,
    limit: u64,
) -> crate::PaginatedResponse<T> {
    crate::PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages: (total + limit - 1) / limit,
    }
}

/// Serves a stored artifact inline, typed by its extension.
pub(crate) async fn file_response(
    path: &std::path::Path,
) -> Result<axum::response::Response, crate::errors::ServiceError> {
    use axum::http::{header, HeaderValue};
    use axum::response::IntoResponse;

    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document.pdf")
        .to_string();
    let content_type = if file_name.ends_with(".zpl") {
        "text/plain; charset=utf-8"
    } else {
        "application/pdf"
    };
    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{}\"", file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
