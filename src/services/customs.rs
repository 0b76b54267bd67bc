//! Customs paperwork for destinations outside the customs union.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::carrier::types::lenient;
use crate::config::CustomsConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::models::customs_document::{self, CustomsStatus};
use crate::models::shipment;
use crate::services::artifacts::{ArtifactStore, CUSTOMS_DIR};
use crate::services::audit::AuditLog;
use crate::services::documents::{CustomsDocumentData, DocumentRenderer};

pub const CATEGORIES: [&str; 6] = ["sale", "gift", "sample", "documents", "return", "other"];
pub const INCOTERMS: [&str; 11] = [
    "EXW", "FCA", "CPT", "CIP", "DAP", "DPU", "DDP", "FAS", "FOB", "CFR", "CIF",
];

/// Customs fields as typed by the operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomsInput {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub goods_description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub goods_value: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub goods_currency: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub goods_origin_country: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub hs_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub incoterm: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub receiver_vat: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub receiver_eori: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
}

impl CustomsInput {
    /// Fills blank currency, origin and incoterm from configuration.
    pub fn with_defaults(mut self, config: &CustomsConfig) -> Self {
        self.goods_currency
            .get_or_insert_with(|| config.default_currency.clone());
        self.goods_origin_country
            .get_or_insert_with(|| config.default_origin_country.clone());
        self.incoterm.get_or_insert_with(|| config.default_incoterm.clone());
        self
    }
}

/// Validated customs data, stored in the shipment meta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomsPayload {
    pub category: String,
    pub goods_description: String,
    pub goods_value: Decimal,
    pub goods_currency: String,
    pub goods_origin_country: String,
    #[serde(default)]
    pub hs_code: Option<String>,
    pub incoterm: String,
    #[serde(default)]
    pub receiver_vat: Option<String>,
    #[serde(default)]
    pub receiver_eori: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomsValidation {
    pub payload: Option<CustomsPayload>,
    pub errors: Vec<String>,
}

pub fn validate_customs_payload(input: &CustomsInput, is_required: bool) -> CustomsValidation {
    if !is_required {
        return CustomsValidation::default();
    }

    let mut errors = Vec::new();
    let text = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or("").to_string();

    let description = text(&input.goods_description);
    if description.is_empty() {
        errors.push("Customs: goods description is required".to_string());
    } else if description.chars().count() > 255 {
        errors.push("Customs: goods description must be at most 255 characters".to_string());
    }

    let raw_value = text(&input.goods_value).replace(',', ".");
    let value = match Decimal::from_str(&raw_value) {
        Ok(v) if v > Decimal::ZERO => Some(v.round_dp(2)),
        Ok(_) => {
            errors.push("Customs: goods value must be greater than zero".to_string());
            None
        }
        Err(_) => {
            errors.push("Customs: goods value must be a number".to_string());
            None
        }
    };

    let currency = text(&input.goods_currency).to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        errors.push("Customs: currency must be a 3-letter ISO code".to_string());
    }

    let origin = text(&input.goods_origin_country).to_ascii_uppercase();
    if origin.len() != 2 || !origin.chars().all(|c| c.is_ascii_alphabetic()) {
        errors.push("Customs: origin country must be a 2-letter ISO code".to_string());
    }

    let category = text(&input.category).to_ascii_lowercase();
    if !CATEGORIES.contains(&category.as_str()) {
        errors.push(format!(
            "Customs: category must be one of {}",
            CATEGORIES.join(", ")
        ));
    }

    let incoterm = text(&input.incoterm).to_ascii_uppercase();
    if !INCOTERMS.contains(&incoterm.as_str()) {
        errors.push(format!(
            "Customs: incoterm must be one of {}",
            INCOTERMS.join(", ")
        ));
    }

    let hs_code: Option<String> = {
        let raw: String = text(&input.hs_code)
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.')
            .collect();
        if raw.is_empty() {
            None
        } else if !(6..=10).contains(&raw.len()) || !raw.chars().all(|c| c.is_ascii_digit()) {
            errors.push("Customs: HS code must have 6 to 10 digits".to_string());
            None
        } else {
            Some(raw)
        }
    };

    let optional = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    match (errors.is_empty(), value) {
        (true, Some(goods_value)) => CustomsValidation {
            payload: Some(CustomsPayload {
                category,
                goods_description: description,
                goods_value,
                goods_currency: currency,
                goods_origin_country: origin,
                hs_code,
                incoterm,
                receiver_vat: optional(&input.receiver_vat),
                receiver_eori: optional(&input.receiver_eori),
                notes: optional(&input.notes),
            }),
            errors,
        },
        _ => CustomsValidation {
            payload: None,
            errors,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomsSyncStatus {
    Skipped,
    Generated,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomsSyncOutcome {
    pub status: CustomsSyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CustomsSyncOutcome {
    fn skipped() -> Self {
        Self {
            status: CustomsSyncStatus::Skipped,
            message: None,
        }
    }
}

/// Keeps the customs document row and its files in line with the shipment.
#[derive(Clone)]
pub struct CustomsSynchronizer {
    db: Arc<DbPool>,
    artifacts: Arc<ArtifactStore>,
    renderer: Arc<dyn DocumentRenderer>,
    audit: AuditLog,
    config: CustomsConfig,
}

impl CustomsSynchronizer {
    pub fn new(
        db: Arc<DbPool>,
        artifacts: Arc<ArtifactStore>,
        renderer: Arc<dyn DocumentRenderer>,
        config: CustomsConfig,
    ) -> Self {
        let audit = AuditLog::new(db.clone());
        Self {
            db,
            artifacts,
            renderer,
            audit,
            config,
        }
    }

    pub fn is_required(&self, country: &str) -> bool {
        self.config.is_required_for(country)
    }

    pub async fn find(
        &self,
        shipment_id: i32,
    ) -> Result<Option<customs_document::Model>, ServiceError> {
        Ok(customs_document::Entity::find()
            .filter(customs_document::Column::ShipmentId.eq(shipment_id))
            .one(&*self.db)
            .await?)
    }

    #[instrument(skip(self, shipment, payload), fields(country = %shipment.consignee_country))]
    pub async fn sync_customs_documents(
        &self,
        shipment_id: i32,
        shipment: &shipment::Model,
        payload: Option<&CustomsPayload>,
    ) -> Result<CustomsSyncOutcome, ServiceError> {
        let existing = self.find(shipment_id).await?;

        let payload = match payload {
            Some(p) if self.is_required(&shipment.consignee_country) => p,
            _ => {
                if let Some(row) = existing {
                    self.remove_row(row).await?;
                }
                return Ok(CustomsSyncOutcome::skipped());
            }
        };

        let data = self.document_data(shipment_id, shipment, payload);
        let dir = format!("{}/{}", CUSTOMS_DIR, shipment_id);
        let rendered = self.render_and_store(&dir, &data).await;

        let now = Utc::now();
        let mut active = match existing.clone() {
            Some(row) => row.into_active_model(),
            None => customs_document::ActiveModel {
                shipment_id: Set(shipment_id),
                invoice_path: Set(None),
                declaration_path: Set(None),
                generated_at: Set(None),
                created_at: Set(now),
                ..Default::default()
            },
        };
        active.category = Set(payload.category.clone());
        active.goods_description = Set(payload.goods_description.clone());
        active.goods_value = Set(payload.goods_value);
        active.goods_currency = Set(payload.goods_currency.clone());
        active.goods_origin_country = Set(payload.goods_origin_country.clone());
        active.hs_code = Set(payload.hs_code.clone());
        active.incoterm = Set(payload.incoterm.clone());
        active.sender_vat = Set(self.config.sender_vat.clone());
        active.sender_eori = Set(self.config.sender_eori.clone());
        active.receiver_vat = Set(payload.receiver_vat.clone());
        active.receiver_eori = Set(payload.receiver_eori.clone());
        active.notes = Set(payload.notes.clone());
        active.updated_at = Set(now);

        let outcome = match rendered {
            Ok((invoice, declaration)) => {
                active.status = Set(CustomsStatus::Generated);
                active.invoice_path = Set(Some(invoice.clone()));
                active.declaration_path = Set(Some(declaration.clone()));
                active.generated_at = Set(Some(now));
                active.last_error = Set(None);
                active.save(&*self.db).await?;

                if let Some(old) = &existing {
                    for path in old.file_paths() {
                        if path != invoice && path != declaration {
                            self.artifacts.delete(path).await;
                        }
                    }
                }
                info!(shipment_id, "customs documents generated");
                CustomsSyncOutcome {
                    status: CustomsSyncStatus::Generated,
                    message: None,
                }
            }
            Err(message) => {
                active.status = Set(CustomsStatus::Error);
                active.last_error = Set(Some(message.clone()));
                active.save(&*self.db).await?;

                warn!(shipment_id, error = %message, "customs document generation failed");
                self.audit
                    .error(
                        format!("Customs documents for shipment {} failed", shipment_id),
                        json!({ "shipment_id": shipment_id, "error": message }),
                        None,
                    )
                    .await;
                CustomsSyncOutcome {
                    status: CustomsSyncStatus::Error,
                    message: Some(message),
                }
            }
        };

        self.artifacts.cleanup_expired().await;
        Ok(outcome)
    }

    /// Deletes the row and its files, used when the shipment goes away.
    pub async fn remove_for_shipment(&self, shipment_id: i32) -> Result<(), ServiceError> {
        if let Some(row) = self.find(shipment_id).await? {
            self.remove_row(row).await?;
        }
        Ok(())
    }

    async fn remove_row(&self, row: customs_document::Model) -> Result<(), ServiceError> {
        let paths: Vec<String> = row.file_paths().into_iter().map(str::to_string).collect();
        customs_document::Entity::delete_by_id(row.id)
            .exec(&*self.db)
            .await?;
        for path in paths {
            self.artifacts.delete(&path).await;
        }
        Ok(())
    }

    /// Both files or neither: a half-written pair is cleaned up.
    async fn render_and_store(
        &self,
        dir: &str,
        data: &CustomsDocumentData,
    ) -> Result<(String, String), String> {
        let invoice = self
            .renderer
            .render_invoice(data)
            .map_err(|e| format!("Invoice rendering failed: {}", e))?;
        let declaration = self
            .renderer
            .render_declaration(data)
            .map_err(|e| format!("Declaration rendering failed: {}", e))?;

        let invoice_file = self
            .artifacts
            .write_document(dir, "invoice", &invoice)
            .await
            .map_err(|e| format!("Invoice could not be saved: {}", e))?;
        match self
            .artifacts
            .write_document(dir, "declaration", &declaration)
            .await
        {
            Ok(declaration_file) => Ok((invoice_file.path, declaration_file.path)),
            Err(e) => {
                self.artifacts.delete(&invoice_file.path).await;
                Err(format!("Declaration could not be saved: {}", e))
            }
        }
    }

    fn document_data(
        &self,
        shipment_id: i32,
        shipment: &shipment::Model,
        payload: &CustomsPayload,
    ) -> CustomsDocumentData {
        CustomsDocumentData {
            shipment_id,
            sender_customer_code: shipment.sender_customer_code.clone(),
            numeric_reference: shipment.numeric_reference,
            alphanumeric_reference: shipment.alphanumeric_reference.clone(),
            consignee_name: shipment.consignee_name.clone(),
            consignee_address: shipment.consignee_address.clone(),
            consignee_zip: shipment.consignee_zip.clone(),
            consignee_city: shipment.consignee_city.clone(),
            consignee_country: shipment.consignee_country.clone(),
            number_of_parcels: shipment.number_of_parcels,
            weight_kg: shipment.weight_kg,
            category: payload.category.clone(),
            goods_description: payload.goods_description.clone(),
            goods_value: payload.goods_value,
            goods_currency: payload.goods_currency.clone(),
            goods_origin_country: payload.goods_origin_country.clone(),
            hs_code: payload.hs_code.clone(),
            incoterm: payload.incoterm.clone(),
            sender_vat: self.config.sender_vat.clone(),
            sender_eori: self.config.sender_eori.clone(),
            receiver_vat: payload.receiver_vat.clone(),
            receiver_eori: payload.receiver_eori.clone(),
            notes: payload.notes.clone(),
            issued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn valid_input() -> CustomsInput {
        CustomsInput {
            category: Some("sale".into()),
            goods_description: Some("Olive oil".into()),
            goods_value: Some("120,5".into()),
            goods_currency: Some("eur".into()),
            goods_origin_country: Some("it".into()),
            hs_code: Some("1509.10".into()),
            incoterm: Some("dap".into()),
            ..Default::default()
        }
    }

    #[test]
    fn valid_input_is_normalized() {
        let result = validate_customs_payload(&valid_input(), true);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let payload = result.payload.unwrap();
        assert_eq!(payload.goods_value, Decimal::new(12050, 2));
        assert_eq!(payload.goods_currency, "EUR");
        assert_eq!(payload.goods_origin_country, "IT");
        assert_eq!(payload.incoterm, "DAP");
        assert_eq!(payload.hs_code.as_deref(), Some("150910"));
    }

    #[test]
    fn zero_value_fails_when_required() {
        let mut input = valid_input();
        input.goods_value = Some("0".into());
        let result = validate_customs_payload(&input, true);
        assert!(result.payload.is_none());
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn not_required_yields_nothing() {
        let result = validate_customs_payload(&CustomsInput::default(), false);
        assert_eq!(result, CustomsValidation::default());
    }

    #[rstest]
    #[case::currency(|i: &mut CustomsInput| i.goods_currency = Some("EURO".into()))]
    #[case::origin(|i: &mut CustomsInput| i.goods_origin_country = Some("ITA".into()))]
    #[case::category(|i: &mut CustomsInput| i.category = Some("weapons".into()))]
    #[case::incoterm(|i: &mut CustomsInput| i.incoterm = Some("XYZ".into()))]
    #[case::hs_code(|i: &mut CustomsInput| i.hs_code = Some("12AB".into()))]
    #[case::description(|i: &mut CustomsInput| i.goods_description = None)]
    fn each_invalid_field_is_reported(#[case] breaks: fn(&mut CustomsInput)) {
        let mut input = valid_input();
        breaks(&mut input);
        let result = validate_customs_payload(&input, true);
        assert!(result.payload.is_none());
        assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
    }

    #[test]
    fn defaults_fill_blank_fields_only() {
        let config = CustomsConfig::default();
        let input = CustomsInput {
            goods_currency: Some("CHF".into()),
            ..Default::default()
        }
        .with_defaults(&config);
        assert_eq!(input.goods_currency.as_deref(), Some("CHF"));
        assert_eq!(input.goods_origin_country.as_deref(), Some("IT"));
        assert_eq!(input.incoterm.as_deref(), Some("DAP"));
    }
}
