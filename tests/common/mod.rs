#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use brt_backoffice::{
    carrier::{
        CarrierError, CarrierResult, Carriers, CreateData, CreateResponse, ExecutionMessage,
        ExecutionResponse, Label, Labels, ManifestApi, ManifestRequest, OfficialManifest, OrmApi,
        OrmPayload, OrmResponse, PudoApi, PudoPoint, PudoQuery, RoutingResponse, ShipmentApi,
        ShipmentKey, TrackingApi, TrackingEvent, TrackingResponse,
    },
    config::{AppConfig, PriceTierConfig},
    db::{self, DbPool},
    handlers::{AppServices, OPERATOR_HEADER},
    models::{shipment, Shipment},
    services::{
        customs::CustomsInput,
        documents::{DocumentRenderer, PdfDocumentRenderer},
        shipment_form::ShipmentForm,
    },
    AppState,
};

pub const SENDER: &str = "0123456";

/// Scripted carrier: each call pops the next queued result, or answers with a
/// plain success when nothing is queued. Every call is recorded by name.
#[derive(Default)]
pub struct FakeCarrier {
    pub calls: Mutex<Vec<String>>,
    pub created: Mutex<Vec<CreateData>>,
    pub manifest_requests: Mutex<Vec<ManifestRequest>>,
    pub orm_payloads: Mutex<Vec<OrmPayload>>,
    pub create_results: Mutex<VecDeque<CarrierResult<CreateResponse>>>,
    pub update_results: Mutex<VecDeque<CarrierResult<CreateResponse>>>,
    pub confirm_results: Mutex<VecDeque<CarrierResult<ExecutionResponse>>>,
    pub delete_results: Mutex<VecDeque<CarrierResult<ExecutionResponse>>>,
    pub reprint_results: Mutex<VecDeque<CarrierResult<CreateResponse>>>,
    pub orm_create_results: Mutex<VecDeque<CarrierResult<OrmResponse>>>,
    pub orm_update_results: Mutex<VecDeque<CarrierResult<OrmResponse>>>,
    pub orm_get_results: Mutex<VecDeque<CarrierResult<OrmResponse>>>,
    pub orm_cancel_results: Mutex<VecDeque<CarrierResult<OrmResponse>>>,
    pub manifest_results: Mutex<VecDeque<CarrierResult<OfficialManifest>>>,
}

impl FakeCarrier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| *c == name).count()
    }

    pub fn push_create(&self, result: CarrierResult<CreateResponse>) {
        self.create_results.lock().unwrap().push_back(result);
    }

    pub fn push_update(&self, result: CarrierResult<CreateResponse>) {
        self.update_results.lock().unwrap().push_back(result);
    }

    pub fn push_confirm(&self, result: CarrierResult<ExecutionResponse>) {
        self.confirm_results.lock().unwrap().push_back(result);
    }

    pub fn push_delete(&self, result: CarrierResult<ExecutionResponse>) {
        self.delete_results.lock().unwrap().push_back(result);
    }

    pub fn push_reprint(&self, result: CarrierResult<CreateResponse>) {
        self.reprint_results.lock().unwrap().push_back(result);
    }

    pub fn push_orm_create(&self, result: CarrierResult<OrmResponse>) {
        self.orm_create_results.lock().unwrap().push_back(result);
    }

    pub fn push_orm_update(&self, result: CarrierResult<OrmResponse>) {
        self.orm_update_results.lock().unwrap().push_back(result);
    }

    pub fn push_orm_get(&self, result: CarrierResult<OrmResponse>) {
        self.orm_get_results.lock().unwrap().push_back(result);
    }

    pub fn push_orm_cancel(&self, result: CarrierResult<OrmResponse>) {
        self.orm_cancel_results.lock().unwrap().push_back(result);
    }

    pub fn push_manifest(&self, result: CarrierResult<OfficialManifest>) {
        self.manifest_results.lock().unwrap().push_back(result);
    }

    fn pop<T>(queue: &Mutex<VecDeque<CarrierResult<T>>>) -> Option<CarrierResult<T>> {
        queue.lock().unwrap().pop_front()
    }
}

/// Successful create answer echoing the request, with a PDF label.
pub fn created_response(data: &CreateData) -> CreateResponse {
    let reference = data.numeric_sender_reference.unwrap_or(0);
    let parcel = format!("0{}{:08}", SENDER, reference);
    CreateResponse {
        execution_message: ExecutionMessage {
            code: Some(0),
            severity: Some("INFO".into()),
            code_desc: Some("OK".into()),
            message: None,
        },
        arrival_terminal: Some("201".into()),
        arrival_depot: Some("201".into()),
        delivery_zone: Some("03".into()),
        departure_depot: data.departure_depot.clone(),
        sender_customer_code: Some(data.sender_customer_code.clone()),
        numeric_sender_reference: data.numeric_sender_reference,
        alphanumeric_sender_reference: data.alphanumeric_sender_reference.clone(),
        number_of_parcels: data.number_of_parcels,
        weight_kg: data.weight_kg,
        consignee_company_name: Some(data.consignee_company_name.clone()),
        labels: Some(Labels {
            label: vec![Label {
                parcel_id: Some(parcel.clone()),
                stream: Some(pdf_stream()),
                tracking_by_parcel_id: Some(format!("T{}", parcel)),
                ..Default::default()
            }],
        }),
        ..Default::default()
    }
}

pub fn pdf_stream() -> String {
    STANDARD.encode(b"%PDF-1.4\n% fake label\n%%EOF\n")
}

pub fn ok_execution() -> ExecutionResponse {
    ExecutionResponse {
        execution_message: ExecutionMessage {
            code: Some(0),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn rejected(message: &str) -> CarrierError {
    CarrierError::rejected(Some(-1), message)
}

#[async_trait]
impl ShipmentApi for FakeCarrier {
    async fn create_shipment(&self, data: &CreateData) -> CarrierResult<CreateResponse> {
        self.record("create");
        self.created.lock().unwrap().push(data.clone());
        Self::pop(&self.create_results).unwrap_or_else(|| Ok(created_response(data)))
    }

    async fn confirm_shipment(&self, _key: &ShipmentKey) -> CarrierResult<ExecutionResponse> {
        self.record("confirm");
        Self::pop(&self.confirm_results).unwrap_or_else(|| Ok(ok_execution()))
    }

    async fn update_shipment(&self, data: &CreateData) -> CarrierResult<CreateResponse> {
        self.record("update");
        Self::pop(&self.update_results).unwrap_or_else(|| Ok(created_response(data)))
    }

    async fn delete_shipment(&self, _key: &ShipmentKey) -> CarrierResult<ExecutionResponse> {
        self.record("delete");
        Self::pop(&self.delete_results).unwrap_or_else(|| Ok(ok_execution()))
    }

    async fn reprint_label(&self, key: &ShipmentKey) -> CarrierResult<CreateResponse> {
        self.record("reprint");
        Self::pop(&self.reprint_results).unwrap_or_else(|| {
            let data = CreateData {
                sender_customer_code: key.sender_customer_code.clone(),
                numeric_sender_reference: Some(key.numeric_sender_reference),
                ..Default::default()
            };
            let mut response = created_response(&data);
            response.consignee_company_name = None;
            Ok(response)
        })
    }

    async fn routing_quote(&self, data: &CreateData) -> CarrierResult<RoutingResponse> {
        self.record("routing");
        Ok(RoutingResponse {
            arrival_terminal: Some("201".into()),
            arrival_depot: Some("201".into()),
            delivery_zone: Some("03".into()),
            service_type: data.service_type.clone(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl TrackingApi for FakeCarrier {
    async fn tracking_by_parcel_id(&self, _parcel_id: &str) -> CarrierResult<TrackingResponse> {
        self.record("tracking");
        Ok(TrackingResponse {
            events: vec![TrackingEvent {
                data: Some("18.10.2026".into()),
                ora: Some("09.12".into()),
                descrizione: Some("PARTITA".into()),
                filiale: Some("MILANO".into()),
            }],
            ..Default::default()
        })
    }
}

#[async_trait]
impl OrmApi for FakeCarrier {
    async fn create_order(&self, payload: &OrmPayload) -> CarrierResult<OrmResponse> {
        self.record("orm_create");
        self.orm_payloads.lock().unwrap().push(payload.clone());
        Self::pop(&self.orm_create_results).unwrap_or_else(|| {
            Ok(OrmResponse {
                reservation_number: Some("R-1001".into()),
                status: Some("ACCEPTED".into()),
                ..Default::default()
            })
        })
    }

    async fn update_order(
        &self,
        _reservation_number: &str,
        payload: &OrmPayload,
    ) -> CarrierResult<OrmResponse> {
        self.record("orm_update");
        self.orm_payloads.lock().unwrap().push(payload.clone());
        Self::pop(&self.orm_update_results).unwrap_or_else(|| {
            Ok(OrmResponse {
                status: Some("UPDATED".into()),
                ..Default::default()
            })
        })
    }

    async fn get_order(&self, reservation_number: &str) -> CarrierResult<OrmResponse> {
        self.record("orm_get");
        Self::pop(&self.orm_get_results).unwrap_or_else(|| {
            Ok(OrmResponse {
                reservation_number: Some(reservation_number.to_string()),
                status: Some("SCHEDULED".into()),
                ..Default::default()
            })
        })
    }

    async fn cancel_order(&self, _reservation_number: &str) -> CarrierResult<OrmResponse> {
        self.record("orm_cancel");
        Self::pop(&self.orm_cancel_results).unwrap_or_else(|| {
            Ok(OrmResponse {
                status: Some("CANCELLED".into()),
                ..Default::default()
            })
        })
    }
}

#[async_trait]
impl ManifestApi for FakeCarrier {
    async fn generate_official_manifest(
        &self,
        request: &ManifestRequest,
    ) -> CarrierResult<OfficialManifest> {
        self.record("manifest");
        self.manifest_requests.lock().unwrap().push(request.clone());
        Self::pop(&self.manifest_results).unwrap_or_else(|| {
            Ok(OfficialManifest {
                manifest_number: Some("M-77".into()),
                manifest_url: Some("https://vas.brt.it/manifest/M-77".into()),
                pdf_stream: Some(pdf_stream()),
                ..Default::default()
            })
        })
    }
}

#[async_trait]
impl PudoApi for FakeCarrier {
    async fn search(&self, query: &PudoQuery) -> CarrierResult<Vec<PudoPoint>> {
        self.record("pudo");
        Ok(vec![PudoPoint {
            id: Some("PUDO-1".into()),
            name: Some("Tabaccheria Centrale".into()),
            zip: Some(query.zip_code.clone()),
            country: Some(query.country_code.clone()),
            ..Default::default()
        }])
    }
}

/// Configuration pointing at a temporary storage root, with a Swiss customs
/// rule, official manifests enabled and three EUR price tiers.
pub fn test_config(storage: &TempDir) -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.brt.sender_customer_code = SENDER.to_string();
    cfg.brt.departure_depot = Some("171".to_string());
    cfg.storage.uploads_root = storage.path().join("uploads");
    cfg.storage.backup_root = Some(storage.path().join("backup"));
    cfg.customs.required_countries = vec!["CH".to_string()];
    cfg.manifest.official_enabled = true;
    cfg.pricing.tiers = vec![
        PriceTierConfig {
            label: "S".into(),
            max_weight_kg: Some(3.0),
            max_volume_m3: None,
            amount: dec!(6.90),
            currency: "EUR".into(),
        },
        PriceTierConfig {
            label: "M".into(),
            max_weight_kg: Some(10.0),
            max_volume_m3: None,
            amount: dec!(9.50),
            currency: "EUR".into(),
        },
        PriceTierConfig {
            label: "XL".into(),
            max_weight_kg: None,
            max_volume_m3: None,
            amount: dec!(24.00),
            currency: "EUR".into(),
        },
    ];
    cfg
}

/// Single-connection in-memory SQLite with the schema applied.
pub async fn test_db(cfg: &AppConfig) -> Arc<DbPool> {
    let pool = db::establish_connection_from_app_config(cfg)
        .await
        .expect("failed to open test database");
    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations in tests");
    Arc::new(pool)
}

/// Helper harness wiring every service to a fake carrier.
pub struct TestApp {
    pub storage: TempDir,
    pub db: Arc<DbPool>,
    pub carrier: Arc<FakeCarrier>,
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let storage = tempfile::tempdir().expect("temp dir");
        let mut cfg = test_config(&storage);
        adjust(&mut cfg);

        let db = test_db(&cfg).await;
        let carrier = FakeCarrier::new();
        let renderer: Arc<dyn DocumentRenderer> = Arc::new(PdfDocumentRenderer::new());
        let services = AppServices::new(
            db.clone(),
            &cfg,
            Carriers::from_client(carrier.clone()),
            renderer,
        );
        let state = AppState {
            db: db.clone(),
            config: cfg,
            services,
        };
        let router = brt_backoffice::app_router(state.clone());

        Self {
            storage,
            db,
            carrier,
            state,
            router,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    pub fn uploads(&self) -> PathBuf {
        self.state.config.storage.uploads_root.clone()
    }

    pub fn backups(&self) -> PathBuf {
        self.state
            .config
            .storage
            .backup_root
            .clone()
            .expect("backup root configured")
    }

    pub async fn shipment(&self, id: i32) -> shipment::Model {
        Shipment::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("query shipment")
            .expect("shipment exists")
    }

    /// Creates a shipment through the service with the given form.
    pub async fn create(&self, form: &ShipmentForm) -> shipment::Model {
        self.services()
            .shipments
            .create_shipment(form, Some("tester"))
            .await
            .expect("shipment created")
            .shipment
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(OPERATOR_HEADER, "tester");
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Minimal valid domestic shipment.
pub fn domestic_form(reference: Option<i64>) -> ShipmentForm {
    ShipmentForm {
        numeric_reference: reference,
        alphanumeric_reference: Some("ORDER-42".into()),
        consignee_company_name: "Rossi Forniture Srl".into(),
        consignee_address: "Via Roma 10".into(),
        consignee_zip: "20121".into(),
        consignee_city: "Milano".into(),
        consignee_province: Some("MI".into()),
        consignee_country: "IT".into(),
        consignee_email: Some("ordini@rossi.example".into()),
        number_of_parcels: Some(1),
        weight_kg: Some(2.5),
        ..Default::default()
    }
}

/// Shipment to Switzerland with complete customs data.
pub fn swiss_form(reference: Option<i64>) -> ShipmentForm {
    ShipmentForm {
        consignee_company_name: "Muller AG".into(),
        consignee_address: "Bahnhofstrasse 1".into(),
        consignee_zip: "8001".into(),
        consignee_city: "Zurich".into(),
        consignee_province: None,
        consignee_country: "CH".into(),
        weight_kg: Some(5.0),
        customs: Some(CustomsInput {
            category: Some("sale".into()),
            goods_description: Some("Leather bags".into()),
            goods_value: Some("250,00".into()),
            hs_code: Some("4202.21".into()),
            ..Default::default()
        }),
        ..domestic_form(reference)
    }
}
