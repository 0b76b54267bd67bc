//! Encoding of the `request_payload` column: `{"request": <CreateData>, "meta": {...}}`.
//! Rows written before meta existed hold the bare carrier object; both shapes decode.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::carrier::CreateData;
use crate::errors::ServiceError;
use crate::services::customs::CustomsPayload;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ParcelDimensions {
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

/// Price-list bracket matched when the shipment was created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceTierMatch {
    pub label: String,
    pub amount: Decimal,
    pub currency: String,
}

/// Local data that travels with a shipment but is not sent to the carrier.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShipmentMeta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<ParcelDimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customs: Option<CustomsPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_tier: Option<PriceTierMatch>,
    /// Address book label the consignee was saved under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredRequest {
    pub request: CreateData,
    #[serde(default)]
    pub meta: ShipmentMeta,
}

pub fn serialize_request_payload(
    request: &CreateData,
    meta: &ShipmentMeta,
) -> Result<String, ServiceError> {
    #[derive(Serialize)]
    struct Envelope<'a> {
        request: &'a CreateData,
        meta: &'a ShipmentMeta,
    }

    Ok(serde_json::to_string(&Envelope { request, meta })?)
}

/// Never fails: unreadable payloads decode to an empty request.
pub fn decode_request_payload(raw: Option<&str>) -> StoredRequest {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return StoredRequest::default();
    };

    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "stored shipment request is not valid JSON");
            return StoredRequest::default();
        }
    };

    let decoded = if value.get("request").map(Value::is_object).unwrap_or(false) {
        serde_json::from_value::<StoredRequest>(value)
    } else {
        serde_json::from_value::<CreateData>(value).map(|request| StoredRequest {
            request,
            meta: ShipmentMeta::default(),
        })
    };

    decoded.unwrap_or_else(|err| {
        warn!(error = %err, "stored shipment request has an unexpected shape");
        StoredRequest::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_request() -> CreateData {
        CreateData {
            sender_customer_code: "1020304".into(),
            departure_depot: Some("102".into()),
            numeric_sender_reference: Some(15),
            alphanumeric_sender_reference: Some("ORD-15".into()),
            number_of_parcels: Some(2),
            weight_kg: Some(3.4),
            volume_m3: Some(0.012),
            consignee_company_name: "Rossi Srl".into(),
            consignee_address: "Via Roma 1".into(),
            consignee_zip_code: "20100".into(),
            consignee_city: "Milano".into(),
            consignee_province_abbreviation: Some("MI".into()),
            consignee_country: "IT".into(),
            ..Default::default()
        }
    }

    #[test]
    fn envelope_round_trips() {
        let request = sample_request();
        let meta = ShipmentMeta {
            dimensions: vec![ParcelDimensions {
                length_cm: 20.0,
                width_cm: 30.0,
                height_cm: 10.0,
            }],
            price_tier: Some(PriceTierMatch {
                label: "S".into(),
                amount: dec!(7.90),
                currency: "EUR".into(),
            }),
            created_by: Some("ops".into()),
            ..Default::default()
        };

        let raw = serialize_request_payload(&request, &meta).unwrap();
        let decoded = decode_request_payload(Some(&raw));
        assert_eq!(decoded, StoredRequest { request, meta });
    }

    #[test]
    fn legacy_bare_request_decodes_with_empty_meta() {
        let raw = serde_json::to_string(&sample_request()).unwrap();
        let decoded = decode_request_payload(Some(&raw));
        assert_eq!(decoded.request, sample_request());
        assert_eq!(decoded.meta, ShipmentMeta::default());
    }

    #[test]
    fn garbage_decodes_to_default() {
        assert_eq!(decode_request_payload(Some("not json")), StoredRequest::default());
        assert_eq!(decode_request_payload(None), StoredRequest::default());
        assert_eq!(decode_request_payload(Some("[1,2]")), StoredRequest::default());
    }
}
