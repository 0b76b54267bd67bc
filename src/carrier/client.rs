use async_trait::async_trait;
use metrics::counter;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    Account, CarrierError, CarrierResult, CreateData, CreateResponse, ExecutionMessage,
    ExecutionResponse, ManifestApi, ManifestRequest, OfficialManifest, OrmApi, OrmPayload,
    OrmResponse, PudoApi, PudoPoint, PudoQuery, RoutingResponse, ShipmentApi, ShipmentKey,
    TrackingApi, TrackingResponse,
};
use crate::config::BrtConfig;

const SHIPMENT_PATH: &str = "rest/v1/shipments/shipment";
const UPDATE_PATH: &str = "rest/v1/shipments/update";
const DELETE_PATH: &str = "rest/v1/shipments/delete";
const REPRINT_PATH: &str = "rest/v1/shipments/reprint";
const ROUTING_PATH: &str = "rest/v1/shipments/routing";
const MANIFEST_PATH: &str = "rest/v1/shipments/manifest";
const TRACKING_PATH: &str = "rest/v1/tracking/parcelID";
const ORM_PATH: &str = "orm/v1/pickups";
const PUDO_PATH: &str = "rest/v1/pudo/search";
const MAX_ERROR_BODY: usize = 2_000;

/// HTTP client for the BRT REST services.
#[derive(Clone)]
pub struct BrtClient {
    http: reqwest::Client,
    base_url: Url,
    account: Account,
    label_output_type: String,
    pudo_token: Option<String>,
}

impl BrtClient {
    pub fn from_config(config: &BrtConfig) -> CarrierResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| CarrierError::Transport(format!("client setup failed: {}", e)))?;

        // Url::join drops the last segment unless the base ends with a slash
        let mut base = config.api_base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| CarrierError::Transport(format!("invalid BRT base url {}: {}", base, e)))?;

        Ok(Self {
            http,
            base_url,
            account: Account {
                user_id: config.user_id.clone(),
                password: config.password.clone(),
            },
            label_output_type: config.label_output_type.clone(),
            pudo_token: config.pudo_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> CarrierResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| CarrierError::Transport(format!("invalid endpoint {}: {}", path, e)))
    }

    fn label_parameters(&self) -> Value {
        json!({
            "outputType": self.label_output_type,
            "offsetX": 0,
            "offsetY": 0,
            "isBorderRequired": "0",
            "isLogoRequired": "0",
            "isBarcodeControlRowRequired": "0"
        })
    }

    /// Sends a request and decodes the body, unwrapping `envelope` when the
    /// carrier nests the payload under it.
    async fn exchange<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
        envelope: Option<&str>,
    ) -> CarrierResult<T> {
        let response = request.send().await.map_err(|e| {
            counter!("brt_carrier_requests_total", 1, "operation" => operation, "outcome" => "transport");
            CarrierError::Transport(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CarrierError::Transport(e.to_string()))?;
        debug!(operation, status = status.as_u16(), "BRT response received");

        if let Some(err) = classify_status(status, &body) {
            let outcome = if err.is_rejection() { "rejected" } else { "transport" };
            counter!("brt_carrier_requests_total", 1, "operation" => operation, "outcome" => outcome);
            return Err(err);
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            counter!("brt_carrier_requests_total", 1, "operation" => operation, "outcome" => "decode");
            CarrierError::Decode(format!("{}: {}", operation, e))
        })?;
        let payload = match envelope {
            Some(key) => match value {
                Value::Object(mut map) if map.contains_key(key) => map.remove(key).unwrap_or(Value::Null),
                other => other,
            },
            None => value,
        };

        let decoded = serde_json::from_value(payload)
            .map_err(|e| CarrierError::Decode(format!("{}: {}", operation, e)))?;
        counter!("brt_carrier_requests_total", 1, "operation" => operation, "outcome" => "ok");
        Ok(decoded)
    }

    async fn post_envelope<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Value,
        envelope: &str,
    ) -> CarrierResult<T> {
        let request = self.http.request(method, self.endpoint(path)?).json(&body);
        self.exchange(operation, request, Some(envelope)).await
    }

    fn orm_request(&self, method: Method, path: &str) -> CarrierResult<reqwest::RequestBuilder> {
        Ok(self
            .http
            .request(method, self.endpoint(path)?)
            .header("userID", &self.account.user_id)
            .header("password", &self.account.password))
    }
}

fn classify_status(status: StatusCode, body: &str) -> Option<CarrierError> {
    if status.is_success() {
        return None;
    }
    let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
    if status.is_client_error() {
        warn!(status = status.as_u16(), "BRT rejected request");
        Some(CarrierError::Rejected {
            code: Some(i64::from(status.as_u16())),
            message: if excerpt.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                excerpt
            },
        })
    } else {
        warn!(status = status.as_u16(), "BRT service failure");
        Some(CarrierError::Transport(format!("HTTP {}: {}", status, excerpt)))
    }
}

/// Negative execution codes are business errors even on HTTP 200.
fn check_execution(message: &ExecutionMessage) -> CarrierResult<()> {
    if message.is_error() {
        Err(CarrierError::Rejected {
            code: message.code,
            message: message.text(),
        })
    } else {
        Ok(())
    }
}

fn check_orm(response: OrmResponse) -> CarrierResult<OrmResponse> {
    if response.reservation_number.is_none() && !response.errors.is_empty() {
        return Err(CarrierError::Rejected {
            code: None,
            message: response.error_messages().join("; "),
        });
    }
    Ok(response)
}

/// Tracking events arrive wrapped as `{"evento": {...}}`.
fn flatten_tracking_events(mut value: Value) -> Value {
    if let Some(Value::Array(events)) = value.get_mut("lista_eventi") {
        for event in events.iter_mut() {
            if let Some(inner) = event.get("evento").cloned() {
                *event = inner;
            }
        }
    }
    value
}

#[async_trait]
impl ShipmentApi for BrtClient {
    #[instrument(skip(self, data), fields(reference = ?data.numeric_sender_reference))]
    async fn create_shipment(&self, data: &CreateData) -> CarrierResult<CreateResponse> {
        let body = json!({
            "account": self.account,
            "createData": data,
            "isLabelRequired": "1",
            "labelParameters": self.label_parameters(),
        });
        let response: CreateResponse = self
            .post_envelope("create", Method::POST, SHIPMENT_PATH, body, "createResponse")
            .await?;
        check_execution(&response.execution_message)?;
        Ok(response)
    }

    #[instrument(skip(self))]
    async fn confirm_shipment(&self, key: &ShipmentKey) -> CarrierResult<ExecutionResponse> {
        let body = json!({ "account": self.account, "confirmData": key });
        let response: ExecutionResponse = self
            .post_envelope("confirm", Method::PUT, SHIPMENT_PATH, body, "confirmResponse")
            .await?;
        check_execution(&response.execution_message)?;
        Ok(response)
    }

    #[instrument(skip(self, data), fields(reference = ?data.numeric_sender_reference))]
    async fn update_shipment(&self, data: &CreateData) -> CarrierResult<CreateResponse> {
        let body = json!({
            "account": self.account,
            "updateData": data,
            "isLabelRequired": "1",
            "labelParameters": self.label_parameters(),
        });
        let response: CreateResponse = self
            .post_envelope("update", Method::PUT, UPDATE_PATH, body, "updateResponse")
            .await?;
        check_execution(&response.execution_message)?;
        Ok(response)
    }

    #[instrument(skip(self))]
    async fn delete_shipment(&self, key: &ShipmentKey) -> CarrierResult<ExecutionResponse> {
        let body = json!({ "account": self.account, "deleteData": key });
        let response: ExecutionResponse = self
            .post_envelope("delete", Method::PUT, DELETE_PATH, body, "deleteResponse")
            .await?;
        check_execution(&response.execution_message)?;
        Ok(response)
    }

    #[instrument(skip(self))]
    async fn reprint_label(&self, key: &ShipmentKey) -> CarrierResult<CreateResponse> {
        let body = json!({
            "account": self.account,
            "reprintData": key,
            "labelParameters": self.label_parameters(),
        });
        let response: CreateResponse = self
            .post_envelope("reprint", Method::POST, REPRINT_PATH, body, "reprintResponse")
            .await?;
        check_execution(&response.execution_message)?;
        Ok(response)
    }

    #[instrument(skip(self, data))]
    async fn routing_quote(&self, data: &CreateData) -> CarrierResult<RoutingResponse> {
        let body = json!({ "account": self.account, "routingData": data });
        let response: RoutingResponse = self
            .post_envelope("routing", Method::POST, ROUTING_PATH, body, "routingResponse")
            .await?;
        check_execution(&response.execution_message)?;
        Ok(response)
    }
}

#[async_trait]
impl TrackingApi for BrtClient {
    #[instrument(skip(self))]
    async fn tracking_by_parcel_id(&self, parcel_id: &str) -> CarrierResult<TrackingResponse> {
        let url = self.endpoint(&format!("{}/{}", TRACKING_PATH, parcel_id))?;
        let request = self
            .http
            .get(url)
            .header("userID", &self.account.user_id)
            .header("password", &self.account.password);
        let raw: Value = self
            .exchange("tracking", request, Some("ttParcelIdResponse"))
            .await?;
        let response: TrackingResponse = serde_json::from_value(flatten_tracking_events(raw))
            .map_err(|e| CarrierError::Decode(format!("tracking: {}", e)))?;
        check_execution(&response.execution_message)?;
        Ok(response)
    }
}

#[async_trait]
impl OrmApi for BrtClient {
    #[instrument(skip(self, payload))]
    async fn create_order(&self, payload: &OrmPayload) -> CarrierResult<OrmResponse> {
        let request = self.orm_request(Method::POST, ORM_PATH)?.json(payload);
        check_orm(self.exchange("orm_create", request, None).await?)
    }

    #[instrument(skip(self, payload))]
    async fn update_order(
        &self,
        reservation_number: &str,
        payload: &OrmPayload,
    ) -> CarrierResult<OrmResponse> {
        let path = format!("{}/{}", ORM_PATH, reservation_number);
        let request = self.orm_request(Method::PUT, &path)?.json(payload);
        check_orm(self.exchange("orm_update", request, None).await?)
    }

    #[instrument(skip(self))]
    async fn get_order(&self, reservation_number: &str) -> CarrierResult<OrmResponse> {
        let path = format!("{}/{}", ORM_PATH, reservation_number);
        let request = self.orm_request(Method::GET, &path)?;
        check_orm(self.exchange("orm_get", request, None).await?)
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, reservation_number: &str) -> CarrierResult<OrmResponse> {
        let path = format!("{}/{}", ORM_PATH, reservation_number);
        let request = self.orm_request(Method::DELETE, &path)?;
        check_orm(self.exchange("orm_cancel", request, None).await?)
    }
}

#[async_trait]
impl ManifestApi for BrtClient {
    #[instrument(skip(self, request), fields(shipments = request.shipments.len()))]
    async fn generate_official_manifest(
        &self,
        request: &ManifestRequest,
    ) -> CarrierResult<OfficialManifest> {
        let body = json!({ "account": self.account, "manifestData": request });
        let response: OfficialManifest = self
            .post_envelope("manifest", Method::POST, MANIFEST_PATH, body, "manifestResponse")
            .await?;
        check_execution(&response.execution_message)?;
        Ok(response)
    }
}

#[async_trait]
impl PudoApi for BrtClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &PudoQuery) -> CarrierResult<Vec<PudoPoint>> {
        let token = self.pudo_token.as_deref().ok_or_else(|| {
            CarrierError::rejected(None, "PUDO search is not enabled for this account")
        })?;

        let mut url = self.endpoint(PUDO_PATH)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("countryCode", &query.country_code)
                .append_pair("zipCode", &query.zip_code)
                .append_pair("maxResults", &query.max_results.to_string());
            if let Some(city) = &query.city {
                pairs.append_pair("city", city);
            }
            if let Some(address) = &query.address {
                pairs.append_pair("address", address);
            }
        }

        let request = self.http.get(url).header("X-API-Auth", token);
        let raw: Value = self.exchange("pudo", request, None).await?;
        let points = match raw {
            Value::Object(mut map) => map.remove("pudo").unwrap_or(Value::Array(Vec::new())),
            other => other,
        };
        let points = match points {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            single => vec![single],
        };
        points
            .into_iter()
            .map(|p| serde_json::from_value(p).map_err(|e| CarrierError::Decode(format!("pudo: {}", e))))
            .collect()
    }
}
