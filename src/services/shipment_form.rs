//! Turns the flat shipment form into a carrier request plus local meta.
//!
//! Create and edit share this path. All problems are collected and reported
//! together as `ServiceError::InvalidForm`.

use serde::{Deserialize, Serialize};

use crate::carrier::types::lenient;
use crate::carrier::CreateData;
use crate::config::{BrtConfig, CustomsConfig, PricingConfig};
use crate::errors::ServiceError;
use crate::services::customs::{validate_customs_payload, CustomsInput};
use crate::services::financial::match_price_tier;
use crate::services::payload::{ParcelDimensions, ShipmentMeta};
use crate::services::recipients::RecipientInput;

const MAX_PARCELS: i64 = 99;
const DEFAULT_COUNTRY: &str = "IT";
const DEFAULT_CURRENCY: &str = "EUR";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShipmentForm {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub numeric_reference: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub alphanumeric_reference: Option<String>,

    #[serde(default)]
    pub consignee_company_name: String,
    #[serde(default)]
    pub consignee_address: String,
    #[serde(default)]
    pub consignee_zip: String,
    #[serde(default)]
    pub consignee_city: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub consignee_province: Option<String>,
    #[serde(default)]
    pub consignee_country: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub consignee_contact_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub consignee_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub consignee_mobile: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub consignee_email: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub number_of_parcels: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub weight_kg: Option<f64>,
    /// Ignored when per-parcel dimensions are given
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub volume_m3: Option<f64>,
    #[serde(default)]
    pub dimensions: Vec<ParcelDimensions>,

    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub cod_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub cod_payment_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub insurance_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub insurance_currency: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub service_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub pudo_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,

    #[serde(default)]
    pub customs: Option<CustomsInput>,

    /// Store the consignee in the address book
    #[serde(default)]
    pub save_recipient: bool,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub recipient_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedShipment {
    pub request: CreateData,
    pub meta: ShipmentMeta,
    /// Present when the operator asked to save the consignee
    pub recipient: Option<RecipientInput>,
    /// Destination needs customs paperwork
    pub customs_required: bool,
}

#[derive(Clone)]
pub struct ShipmentFormProcessor {
    brt: BrtConfig,
    customs: CustomsConfig,
    pricing: PricingConfig,
}

impl ShipmentFormProcessor {
    pub fn new(brt: BrtConfig, customs: CustomsConfig, pricing: PricingConfig) -> Self {
        Self {
            brt,
            customs,
            pricing,
        }
    }

    pub fn process(
        &self,
        form: &ShipmentForm,
        actor: Option<&str>,
    ) -> Result<ProcessedShipment, ServiceError> {
        let mut errors = Vec::new();

        let country = match form.consignee_country.trim() {
            "" => DEFAULT_COUNTRY.to_string(),
            c => c.to_ascii_uppercase(),
        };
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push("Consignee country must be a 2-letter ISO code".to_string());
        }

        let name = required(&form.consignee_company_name, "Consignee name", 70, &mut errors);
        let address = required(&form.consignee_address, "Consignee address", 105, &mut errors);
        let city = required(&form.consignee_city, "Consignee city", 35, &mut errors);
        let zip = required(&form.consignee_zip, "Consignee ZIP code", 9, &mut errors);
        if country == "IT" && !zip.is_empty() {
            if zip.len() != 5 || !zip.chars().all(|c| c.is_ascii_digit()) {
                errors.push("Italian ZIP codes have 5 digits".to_string());
            }
        }

        let province = form
            .consignee_province
            .as_deref()
            .map(|p| p.trim().to_ascii_uppercase())
            .filter(|p| !p.is_empty());
        if let Some(p) = &province {
            if p.len() > 2 {
                errors.push("Province must be a 2-letter abbreviation".to_string());
            }
        }

        if let Some(email) = &form.consignee_email {
            if !validator::validate_email(email.as_str()) {
                errors.push("Consignee e-mail is not valid".to_string());
            }
        }

        if let Some(reference) = form.numeric_reference {
            if reference <= 0 {
                errors.push("Numeric reference must be a positive number".to_string());
            }
        }
        if let Some(alpha) = &form.alphanumeric_reference {
            if alpha.chars().count() > 80 {
                errors.push("Alphanumeric reference must be at most 80 characters".to_string());
            }
        }

        for (index, d) in form.dimensions.iter().enumerate() {
            if d.length_cm <= 0.0 || d.width_cm <= 0.0 || d.height_cm <= 0.0 {
                errors.push(format!("Parcel {}: dimensions must be positive", index + 1));
            }
        }

        let parcels = match (form.number_of_parcels, form.dimensions.len() as i64) {
            (Some(n), 0) => n,
            (None, 0) => 1,
            (None, d) => d,
            (Some(n), d) => {
                if n != d {
                    errors.push(format!(
                        "Number of parcels ({}) does not match the {} dimension rows",
                        n, d
                    ));
                }
                n
            }
        };
        if !(1..=MAX_PARCELS).contains(&parcels) {
            errors.push(format!("Number of parcels must be between 1 and {}", MAX_PARCELS));
        }

        let weight = form.weight_kg.unwrap_or(0.0);
        if weight <= 0.0 {
            errors.push("Weight must be greater than zero".to_string());
        }

        let volume = if form.dimensions.is_empty() {
            form.volume_m3.filter(|v| *v > 0.0)
        } else {
            Some(volume_from_dimensions(&form.dimensions))
        };
        if form.volume_m3.map_or(false, |v| v < 0.0) {
            errors.push("Volume cannot be negative".to_string());
        }

        let cod = form.cod_amount.filter(|a| *a != 0.0);
        match cod {
            Some(a) if a < 0.0 => errors.push("Cash on delivery cannot be negative".to_string()),
            None if form.cod_payment_type.is_some() => errors
                .push("A cash on delivery payment type needs an amount".to_string()),
            _ => {}
        }

        let insurance = form.insurance_amount.filter(|a| *a != 0.0);
        match insurance {
            Some(a) if a < 0.0 => errors.push("Insured value cannot be negative".to_string()),
            None if form.insurance_currency.is_some() => {
                errors.push("An insurance currency needs an insured value".to_string())
            }
            _ => {}
        }

        if form.pudo_id.is_some() {
            if cod.is_some() {
                errors.push(
                    "Cash on delivery is not available for pickup-point deliveries".to_string(),
                );
            }
            if form.consignee_email.is_none() && form.consignee_mobile.is_none() {
                errors.push(
                    "Pickup-point deliveries need the consignee e-mail or mobile number"
                        .to_string(),
                );
            }
        }

        let customs_required = self.customs.is_required_for(&country);
        let customs = if customs_required {
            let input = form
                .customs
                .clone()
                .unwrap_or_default()
                .with_defaults(&self.customs);
            let validation = validate_customs_payload(&input, true);
            errors.extend(validation.errors);
            validation.payload
        } else {
            None
        };

        let recipient = if form.save_recipient {
            let label = form
                .recipient_label
                .clone()
                .unwrap_or_else(|| name.clone());
            Some(RecipientInput {
                label,
                company_name: name.clone(),
                address: address.clone(),
                zip: zip.clone(),
                city: city.clone(),
                province: province.clone(),
                country: country.clone(),
                contact_name: form.consignee_contact_name.clone(),
                phone: form
                    .consignee_phone
                    .clone()
                    .or_else(|| form.consignee_mobile.clone()),
                email: form.consignee_email.clone(),
            })
        } else {
            None
        };

        if !errors.is_empty() {
            return Err(ServiceError::InvalidForm(errors));
        }

        let request = CreateData {
            network: None,
            departure_depot: self.brt.departure_depot.clone(),
            sender_customer_code: self.brt.sender_customer_code.clone(),
            numeric_sender_reference: form.numeric_reference,
            alphanumeric_sender_reference: form.alphanumeric_reference.clone(),
            number_of_parcels: Some(parcels),
            weight_kg: Some(round_to(weight, 1)),
            volume_m3: volume,
            consignee_company_name: name,
            consignee_address: address,
            consignee_zip_code: zip,
            consignee_city: city,
            consignee_province_abbreviation: province,
            consignee_country: country,
            consignee_contact_name: form.consignee_contact_name.clone(),
            consignee_telephone: form.consignee_phone.clone(),
            consignee_email: form.consignee_email.clone(),
            consignee_mobile_phone_number: form.consignee_mobile.clone(),
            is_cod_mandatory: cod.map(|_| "1".to_string()),
            cash_on_delivery: cod,
            cod_currency: cod.map(|_| DEFAULT_CURRENCY.to_string()),
            cod_payment_type: cod.and(form.cod_payment_type.clone()),
            insurance_amount: insurance,
            insurance_amount_currency: insurance.map(|_| {
                form.insurance_currency
                    .clone()
                    .map(|c| c.to_ascii_uppercase())
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
            }),
            service_type: form
                .service_type
                .clone()
                .or_else(|| self.brt.default_service_type.clone()),
            pricing_condition_code: self.brt.pricing_condition_code.clone(),
            pudo_id: form.pudo_id.clone(),
            notes: form.notes.clone(),
            extra: Default::default(),
        };

        let meta = ShipmentMeta {
            dimensions: form.dimensions.clone(),
            customs,
            price_tier: match_price_tier(weight, volume, &self.pricing),
            recipient_label: recipient.as_ref().map(|r| r.label.clone()),
            created_by: actor.map(str::to_string),
            extra: Default::default(),
        };

        Ok(ProcessedShipment {
            request,
            meta,
            recipient,
            customs_required,
        })
    }
}

fn required(value: &str, field: &str, max: usize, errors: &mut Vec<String>) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(format!("{} is required", field));
    } else if trimmed.chars().count() > max {
        errors.push(format!("{} must be at most {} characters", field, max));
    }
    trimmed.to_string()
}

/// Total volume in m3, rounded to 3 decimals.
pub fn volume_from_dimensions(dimensions: &[ParcelDimensions]) -> f64 {
    let cm3: f64 = dimensions
        .iter()
        .map(|d| d.length_cm * d.width_cm * d.height_cm)
        .sum();
    round_to(cm3 / 1_000_000.0, 3)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
