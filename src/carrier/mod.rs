//! Boundary to the BRT carrier web services.
//!
//! Services depend on the traits below, never on the HTTP client directly, so
//! tests can swap in scripted carriers.

pub mod client;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use client::BrtClient;
pub use types::*;

/// Failure reported by (or while talking to) the carrier.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CarrierError {
    /// Business failure with the carrier's own text.
    #[error("BRT rejected the request: {message}")]
    Rejected { code: Option<i64>, message: String },

    #[error("BRT transport failure: {0}")]
    Transport(String),

    #[error("BRT response could not be decoded: {0}")]
    Decode(String),
}

impl CarrierError {
    pub fn rejected(code: Option<i64>, message: impl Into<String>) -> Self {
        CarrierError::Rejected {
            code,
            message: message.into(),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, CarrierError::Rejected { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            CarrierError::Rejected { message, .. } => message,
            CarrierError::Transport(message) | CarrierError::Decode(message) => message,
        }
    }

    /// The carrier refused the numeric sender reference because it is taken.
    pub fn is_reference_already_used(&self) -> bool {
        self.is_rejection()
            && contains_any(
                self.message(),
                &["already used", "already exist", "già utilizzat", "gia' utilizzat"],
            )
    }

    /// Confirming a shipment that the carrier already holds as confirmed.
    pub fn is_already_confirmed(&self) -> bool {
        self.is_rejection()
            && contains_any(
                self.message(),
                &["already confirmed", "già confermat", "gia' confermat"],
            )
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|needle| lower.contains(needle))
}

pub type CarrierResult<T> = Result<T, CarrierError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShipmentApi: Send + Sync {
    async fn create_shipment(&self, data: &CreateData) -> CarrierResult<CreateResponse>;
    async fn confirm_shipment(&self, key: &ShipmentKey) -> CarrierResult<ExecutionResponse>;
    async fn update_shipment(&self, data: &CreateData) -> CarrierResult<CreateResponse>;
    async fn delete_shipment(&self, key: &ShipmentKey) -> CarrierResult<ExecutionResponse>;
    async fn reprint_label(&self, key: &ShipmentKey) -> CarrierResult<CreateResponse>;
    async fn routing_quote(&self, data: &CreateData) -> CarrierResult<RoutingResponse>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackingApi: Send + Sync {
    async fn tracking_by_parcel_id(&self, parcel_id: &str) -> CarrierResult<TrackingResponse>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrmApi: Send + Sync {
    async fn create_order(&self, payload: &OrmPayload) -> CarrierResult<OrmResponse>;
    async fn update_order(
        &self,
        reservation_number: &str,
        payload: &OrmPayload,
    ) -> CarrierResult<OrmResponse>;
    async fn get_order(&self, reservation_number: &str) -> CarrierResult<OrmResponse>;
    async fn cancel_order(&self, reservation_number: &str) -> CarrierResult<OrmResponse>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManifestApi: Send + Sync {
    async fn generate_official_manifest(
        &self,
        request: &ManifestRequest,
    ) -> CarrierResult<OfficialManifest>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PudoApi: Send + Sync {
    async fn search(&self, query: &PudoQuery) -> CarrierResult<Vec<PudoPoint>>;
}

/// One handle per carrier service, usually all backed by the same client.
#[derive(Clone)]
pub struct Carriers {
    pub shipments: Arc<dyn ShipmentApi>,
    pub tracking: Arc<dyn TrackingApi>,
    pub orm: Arc<dyn OrmApi>,
    pub manifests: Arc<dyn ManifestApi>,
    pub pudo: Arc<dyn PudoApi>,
}

impl Carriers {
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: ShipmentApi + TrackingApi + OrmApi + ManifestApi + PudoApi + 'static,
    {
        Self {
            shipments: client.clone(),
            tracking: client.clone(),
            orm: client.clone(),
            manifests: client.clone(),
            pudo: client,
        }
    }
}
