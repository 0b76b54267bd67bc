//! Typed request/response shapes for the BRT web services.
//!
//! BRT is inconsistent about scalar types (numbers sometimes arrive as strings,
//! decimals may use a comma) and about cardinality (a single label is an object,
//! several are a list). The decoders here absorb those variations; fields the
//! crate does not model are kept in `extra` so stored payloads round-trip.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub(crate) mod lenient {
    use super::*;

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        })
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().replace(',', ".").parse::<f64>().ok(),
            _ => None,
        })
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn one_or_many<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: serde::de::DeserializeOwned,
    {
        let value = Option::<Value>::deserialize(d)?;
        match value {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(serde::de::Error::custom))
                .collect(),
            Some(other) => serde_json::from_value(other)
                .map(|item| vec![item])
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Web service account credentials, sent with every shipment call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Account {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub password: String,
}

/// Shipment creation data as sent to `createShipment`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateData {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub network: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub departure_depot: Option<String>,
    #[serde(default)]
    pub sender_customer_code: String,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub numeric_sender_reference: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub alphanumeric_sender_reference: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub number_of_parcels: Option<i64>,
    #[serde(rename = "weightKG", default, deserialize_with = "lenient::opt_f64")]
    pub weight_kg: Option<f64>,
    #[serde(rename = "volumeM3", default, deserialize_with = "lenient::opt_f64")]
    pub volume_m3: Option<f64>,
    #[serde(default)]
    pub consignee_company_name: String,
    #[serde(default)]
    pub consignee_address: String,
    #[serde(rename = "consigneeZIPCode", default)]
    pub consignee_zip_code: String,
    #[serde(default)]
    pub consignee_city: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub consignee_province_abbreviation: Option<String>,
    #[serde(rename = "consigneeCountryAbbreviationISOAlpha2", default)]
    pub consignee_country: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub consignee_contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub consignee_telephone: Option<String>,
    #[serde(rename = "consigneeEMail", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub consignee_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub consignee_mobile_phone_number: Option<String>,
    #[serde(rename = "isCODMandatory", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub is_cod_mandatory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub cash_on_delivery: Option<f64>,
    #[serde(rename = "codCurrency", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub cod_currency: Option<String>,
    #[serde(rename = "codPaymentType", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub cod_payment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub insurance_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub insurance_amount_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub pricing_condition_code: Option<String>,
    #[serde(rename = "pudoId", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub pudo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Execution diagnostic attached to every BRT response. Code `0` is success,
/// positive codes are warnings, negative codes are errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMessage {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub code: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub code_desc: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub message: Option<String>,
}

impl ExecutionMessage {
    pub fn code(&self) -> i64 {
        self.code.unwrap_or(0)
    }

    pub fn is_error(&self) -> bool {
        self.code() < 0
    }

    /// Best human-readable text the carrier gave us.
    pub fn text(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.code_desc.clone())
            .unwrap_or_else(|| format!("BRT execution code {}", self.code()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub data_length: Option<i64>,
    #[serde(rename = "parcelID", default, deserialize_with = "lenient::opt_string")]
    pub parcel_id: Option<String>,
    /// Base64 encoded label document
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub stream: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub parcel_number_geo_post: Option<String>,
    #[serde(rename = "trackingByParcelID", default, deserialize_with = "lenient::opt_string")]
    pub tracking_by_parcel_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Labels {
    #[serde(default, deserialize_with = "lenient::one_or_many")]
    pub label: Vec<Label>,
}

/// Response of `createShipment`, `updateShipment` and `reprintShipmentLabel`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    #[serde(default)]
    pub execution_message: ExecutionMessage,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub arrival_terminal: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub arrival_depot: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub delivery_zone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub parcel_number_from: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub parcel_number_to: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub departure_depot: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sender_customer_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub numeric_sender_reference: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub alphanumeric_sender_reference: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub number_of_parcels: Option<i64>,
    #[serde(rename = "weightKG", default, deserialize_with = "lenient::opt_f64")]
    pub weight_kg: Option<f64>,
    #[serde(rename = "volumeM3", default, deserialize_with = "lenient::opt_f64")]
    pub volume_m3: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub consignee_company_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub consignee_address: Option<String>,
    #[serde(rename = "consigneeZIPCode", default, deserialize_with = "lenient::opt_string")]
    pub consignee_zip_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub consignee_city: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub consignee_province_abbreviation: Option<String>,
    #[serde(rename = "consigneeCountryAbbreviationBRT", default, deserialize_with = "lenient::opt_string")]
    pub consignee_country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CreateResponse {
    pub fn labels(&self) -> &[Label] {
        self.labels.as_ref().map(|l| l.label.as_slice()).unwrap_or(&[])
    }

    pub fn first_label(&self) -> Option<&Label> {
        self.labels().first()
    }
}

/// Identifies a shipment on the carrier side for confirm/delete/reprint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentKey {
    pub sender_customer_code: String,
    pub numeric_sender_reference: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alphanumeric_sender_reference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    #[serde(default)]
    pub execution_message: ExecutionMessage,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingResponse {
    #[serde(default)]
    pub execution_message: ExecutionMessage,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub arrival_terminal: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub arrival_depot: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub delivery_zone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub service_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrackingEvent {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub data: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub ora: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub descrizione: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub filiale: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrackingResponse {
    #[serde(rename = "executionMessage", default)]
    pub execution_message: ExecutionMessage,
    #[serde(rename = "lista_eventi", default, deserialize_with = "lenient::one_or_many")]
    pub events: Vec<TrackingEvent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference to one shipment inside an official manifest request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestShipmentRef {
    pub numeric_sender_reference: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alphanumeric_sender_reference: Option<String>,
    pub number_of_parcels: i64,
    #[serde(rename = "weightKG")]
    pub weight_kg: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRequest {
    pub sender_customer_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_depot: Option<String>,
    pub shipments: Vec<ManifestShipmentRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfficialManifest {
    #[serde(default)]
    pub execution_message: ExecutionMessage,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub manifest_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub manifest_url: Option<String>,
    /// Base64 encoded PDF, when the carrier returns the document inline
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub pdf_stream: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PudoQuery {
    pub country_code: String,
    pub zip_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub max_results: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PudoPoint {
    #[serde(alias = "pudoId", default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(alias = "pointName", default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub address: Option<String>,
    #[serde(alias = "zipCode", default, deserialize_with = "lenient::opt_string")]
    pub zip: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub city: Option<String>,
    #[serde(alias = "countryCode", default, deserialize_with = "lenient::opt_string")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub longitude: Option<f64>,
}

// ---------------------------------------------------------------------------
// ORM (pickup order) payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeholderRole {
    /// Requester
    #[serde(rename = "RQ")]
    Requester,
    /// Sender (where the goods are collected)
    #[serde(rename = "SE")]
    Sender,
    /// Receiver
    #[serde(rename = "RE")]
    Receiver,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressBlock {
    pub name: String,
    pub address: String,
    pub zip_code: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    pub country_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stakeholder {
    #[serde(rename = "type")]
    pub role: StakeholderRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfos {
    pub collection_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_time_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_time_to: Option<String>,
    pub payer_type: String,
    pub number_of_parcels: i64,
    #[serde(rename = "weightKG")]
    pub weight_kg: f64,
    #[serde(rename = "volumeM3", skip_serializing_if = "Option::is_none")]
    pub volume_m3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goods_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfos {
    pub customer_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParcelExpiry {
    pub parcel_id: String,
    pub expiry_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrtSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parcels_expiry: Vec<ParcelExpiry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrmPayload {
    pub request_infos: RequestInfos,
    pub customer_infos: CustomerInfos,
    pub stakeholders: Vec<Stakeholder>,
    pub brt_spec: BrtSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrmError {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub code: Option<String>,
    #[serde(default, alias = "description", deserialize_with = "lenient::opt_string")]
    pub message: Option<String>,
}

/// Response of every ORM call. The reservation number is the carrier's identity
/// for the pickup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrmResponse {
    #[serde(alias = "numeroRitiro", default, deserialize_with = "lenient::opt_string")]
    pub reservation_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::one_or_many")]
    pub errors: Vec<OrmError>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrmResponse {
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| match (&e.code, &e.message) {
                (Some(code), Some(msg)) => format!("{}: {}", code, msg),
                (None, Some(msg)) => msg.clone(),
                (Some(code), None) => code.clone(),
                (None, None) => "unspecified error".to_string(),
            })
            .collect()
    }
}
