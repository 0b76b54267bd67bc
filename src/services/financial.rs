use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::PricingConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::models::{ledger_entry, shipment, ShipmentStatus};
use crate::services::payload::{decode_request_payload, PriceTierMatch};

const LEDGER_CURRENCY: &str = "EUR";
const MAX_REFERENCE_LEN: usize = 80;

/// First configured tier whose weight and volume limits both admit the shipment.
/// A tier without a limit on one axis accepts any value on that axis.
pub fn match_price_tier(
    weight_kg: f64,
    volume_m3: Option<f64>,
    pricing: &PricingConfig,
) -> Option<PriceTierMatch> {
    let volume = volume_m3.unwrap_or(0.0);
    pricing
        .tiers
        .iter()
        .find(|tier| {
            tier.max_weight_kg.map_or(true, |max| weight_kg <= max)
                && tier.max_volume_m3.map_or(true, |max| volume <= max)
        })
        .map(|tier| PriceTierMatch {
            label: tier.label.clone(),
            amount: tier.amount,
            currency: tier.currency.to_ascii_uppercase(),
        })
}

/// `BRT-{SENDER}-{N}` with the sender reduced to uppercase alphanumerics.
pub fn financial_reference(sender_customer_code: &str, numeric_reference: i64) -> String {
    let sender: String = sender_customer_code
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let reference = format!("BRT-{}-{}", sender, numeric_reference);
    reference.chars().take(MAX_REFERENCE_LEN).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinancialOutcome {
    Created(i32),
    AlreadyPresent,
    /// Nothing to record, with the reason
    Skipped(&'static str),
}

/// Mirrors confirmed shipments into the shared ledger.
#[derive(Clone)]
pub struct FinancialBridge {
    db: Arc<DbPool>,
    pricing: PricingConfig,
}

impl FinancialBridge {
    pub fn new(db: Arc<DbPool>, pricing: PricingConfig) -> Self {
        Self { db, pricing }
    }

    #[instrument(skip(self))]
    pub async fn ensure_financial_entry(
        &self,
        shipment_id: i32,
        force: bool,
    ) -> Result<FinancialOutcome, ServiceError> {
        let shipment = shipment::Entity::find_by_id(shipment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Shipment", shipment_id))?;

        if !force && shipment.status != ShipmentStatus::Confirmed {
            return Ok(FinancialOutcome::Skipped("shipment not confirmed"));
        }

        let stored = decode_request_payload(shipment.request_payload.as_deref());
        let Some(tier) = stored.meta.price_tier else {
            return Ok(FinancialOutcome::Skipped("no price tier"));
        };
        if tier.amount <= Decimal::ZERO {
            return Ok(FinancialOutcome::Skipped("zero amount"));
        }
        if !tier.currency.eq_ignore_ascii_case(LEDGER_CURRENCY) {
            info!(
                shipment_id,
                currency = %tier.currency,
                "ledger entry skipped, only EUR amounts are recorded"
            );
            return Ok(FinancialOutcome::Skipped("unsupported currency"));
        }

        let reference =
            financial_reference(&shipment.sender_customer_code, shipment.numeric_reference);
        let existing = ledger_entry::Entity::find()
            .filter(ledger_entry::Column::Reference.eq(reference.as_str()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            debug!(%reference, "ledger entry already present");
            return Ok(FinancialOutcome::AlreadyPresent);
        }

        let entry = ledger_entry::ActiveModel {
            reference: Set(reference.clone()),
            description: Set(format!(
                "BRT shipment {} to {} ({})",
                shipment.numeric_reference, shipment.consignee_name, tier.label
            )),
            amount: Set(tier.amount),
            currency: Set(LEDGER_CURRENCY.to_string()),
            kind: Set(self.pricing.ledger_kind.clone()),
            category: Set(self.pricing.ledger_category.clone()),
            entry_date: Set(shipment
                .confirmed_at
                .unwrap_or_else(Utc::now)
                .date_naive()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(%reference, amount = %tier.amount, "ledger entry created");
        Ok(FinancialOutcome::Created(entry.id))
    }

    /// Returns the number of rows removed.
    #[instrument(skip(self))]
    pub async fn remove_financial_entry(
        &self,
        sender_customer_code: &str,
        numeric_reference: i64,
    ) -> Result<u64, ServiceError> {
        let reference = financial_reference(sender_customer_code, numeric_reference);
        let result = ledger_entry::Entity::delete_many()
            .filter(ledger_entry::Column::Reference.eq(reference.as_str()))
            .exec(&*self.db)
            .await?;
        if result.rows_affected > 0 {
            info!(%reference, "ledger entry removed");
        }
        Ok(result.rows_affected)
    }
}
