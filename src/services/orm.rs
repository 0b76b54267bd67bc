//! Pickup orders (ORM): payload building and the reservation lifecycle.
//!
//! Every submission is recorded as `pending` before BRT is called and keeps its
//! row whatever the carrier answers. Only an explicit update mutates an
//! existing row.

use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::carrier::types::lenient;
use crate::carrier::{
    AddressBlock, BrtSpec, CarrierError, CustomerInfos, OrmApi, OrmPayload, OrmResponse,
    ParcelExpiry, RequestInfos, Stakeholder, StakeholderRole,
};
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::models::orm_request::{self, OrmStatus};
use crate::services::audit::AuditLog;

/// Service code of the fresh-goods product, which needs parcel expiry dates.
pub const FRESH_SERVICE_CODE: &str = "B20";
const PAYER_TYPES: [&str; 3] = ["RQ", "SE", "RE"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrmForm {
    pub collection_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub collection_time_from: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub collection_time_to: Option<String>,
    #[serde(default)]
    pub payer_type: String,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub number_of_parcels: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub weight_kg: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub volume_m3: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub goods_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub customer_reference: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub requester_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub requester_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub requester_email: Option<String>,

    /// BRT account of the sender; replaces the sender address when set
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sender_account_code: Option<String>,
    #[serde(default)]
    pub sender: OrmAddressForm,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sender_contact: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sender_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sender_email: Option<String>,

    #[serde(default)]
    pub receiver: OrmAddressForm,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub service_code: Option<String>,
    /// One `PARCELID|YYYY-MM-DD` per line
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub parcel_expiry: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrmAddressForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub province: Option<String>,
    #[serde(default)]
    pub country: String,
}

impl OrmAddressForm {
    fn is_blank(&self) -> bool {
        [&self.name, &self.address, &self.zip, &self.city, &self.country]
            .iter()
            .all(|v| v.trim().is_empty())
    }

    fn to_block(&self, who: &str, errors: &mut Vec<String>) -> Option<AddressBlock> {
        let fields = [
            ("name", &self.name),
            ("address", &self.address),
            ("ZIP code", &self.zip),
            ("city", &self.city),
            ("country", &self.country),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(label, _)| *label)
            .collect();
        if !missing.is_empty() {
            errors.push(format!("{} {} missing", who, missing.join(", ")));
            return None;
        }
        Some(AddressBlock {
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            zip_code: self.zip.trim().to_string(),
            city: self.city.trim().to_string(),
            province: self.province.as_deref().map(|p| p.trim().to_ascii_uppercase()),
            country_code: self.country.trim().to_ascii_uppercase(),
        })
    }
}

/// Parses `PARCELID|YYYY-MM-DD` lines; `;` works as separator too. Blank lines
/// are skipped.
pub fn parse_expiry_lines(raw: &str) -> Result<Vec<ParcelExpiry>, Vec<String>> {
    let mut parsed = Vec::new();
    let mut errors = Vec::new();

    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((code, date)) = line.split_once(['|', ';']) else {
            errors.push(format!("Expiry line {}: expected PARCELID|YYYY-MM-DD", index + 1));
            continue;
        };
        let code = code.trim();
        if code.is_empty() {
            errors.push(format!("Expiry line {}: parcel id is empty", index + 1));
            continue;
        }
        match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
            Ok(expiry_date) => parsed.push(ParcelExpiry {
                parcel_id: code.to_string(),
                expiry_date,
            }),
            Err(_) => errors.push(format!(
                "Expiry line {}: '{}' is not a YYYY-MM-DD date",
                index + 1,
                date.trim()
            )),
        }
    }

    if errors.is_empty() {
        Ok(parsed)
    } else {
        Err(errors)
    }
}

fn parse_time(value: &Option<String>, label: &str, errors: &mut Vec<String>) -> Option<NaiveTime> {
    let raw = value.as_deref()?;
    match NaiveTime::parse_from_str(raw, "%H:%M") {
        Ok(t) => Some(t),
        Err(_) => {
            errors.push(format!("{} must be HH:MM", label));
            None
        }
    }
}

/// Builds the nested carrier payload from the flat form.
pub fn build_orm_payload(
    form: &OrmForm,
    customer_code: &str,
    today: NaiveDate,
) -> Result<OrmPayload, ServiceError> {
    let mut errors = Vec::new();

    let collection_date = match form.collection_date {
        Some(date) if date < today => {
            errors.push("Collection date cannot be in the past".to_string());
            date
        }
        Some(date) => date,
        None => {
            errors.push("Collection date is required".to_string());
            today
        }
    };

    let from = parse_time(&form.collection_time_from, "Collection time from", &mut errors);
    let to = parse_time(&form.collection_time_to, "Collection time to", &mut errors);
    if let (Some(from), Some(to)) = (from, to) {
        if from >= to {
            errors.push("Collection window must end after it starts".to_string());
        }
    }

    let payer_type = form.payer_type.trim().to_ascii_uppercase();
    if !PAYER_TYPES.contains(&payer_type.as_str()) {
        errors.push(format!("Payer type must be one of {}", PAYER_TYPES.join(", ")));
    }

    let parcels = form.number_of_parcels.unwrap_or(0);
    if parcels < 1 {
        errors.push("At least one parcel is required".to_string());
    }
    let weight = form.weight_kg.unwrap_or(0.0);
    if weight <= 0.0 {
        errors.push("Weight must be greater than zero".to_string());
    }

    if customer_code.trim().is_empty() {
        errors.push("BRT customer code is not configured".to_string());
    }

    let mut stakeholders = vec![Stakeholder {
        role: StakeholderRole::Requester,
        account_code: Some(customer_code.to_string()),
        address: None,
        contact_name: form.requester_name.clone(),
        phone: form.requester_phone.clone(),
        email: form.requester_email.clone(),
    }];

    let sender_address = if form.sender_account_code.is_some() {
        None
    } else if form.sender.is_blank() {
        errors.push("Sender needs a BRT account code or a full address".to_string());
        None
    } else {
        form.sender.to_block("Sender", &mut errors)
    };
    stakeholders.push(Stakeholder {
        role: StakeholderRole::Sender,
        account_code: form.sender_account_code.clone(),
        address: sender_address,
        contact_name: form.sender_contact.clone(),
        phone: form.sender_phone.clone(),
        email: form.sender_email.clone(),
    });

    if !form.receiver.is_blank() {
        if let Some(address) = form.receiver.to_block("Receiver", &mut errors) {
            stakeholders.push(Stakeholder {
                role: StakeholderRole::Receiver,
                account_code: None,
                address: Some(address),
                contact_name: None,
                phone: None,
                email: None,
            });
        }
    }

    let service_code = form
        .service_code
        .as_deref()
        .map(|s| s.trim().to_ascii_uppercase());
    let parcels_expiry = match form.parcel_expiry.as_deref() {
        Some(raw) => parse_expiry_lines(raw).unwrap_or_else(|line_errors| {
            errors.extend(line_errors);
            Vec::new()
        }),
        None => Vec::new(),
    };
    if service_code.as_deref() == Some(FRESH_SERVICE_CODE) && parcels_expiry.is_empty() {
        errors.push(format!(
            "Service {} needs at least one parcel expiry line",
            FRESH_SERVICE_CODE
        ));
    }

    if !errors.is_empty() {
        return Err(ServiceError::InvalidForm(errors));
    }

    Ok(OrmPayload {
        request_infos: RequestInfos {
            collection_date,
            collection_time_from: from.map(|t| t.format("%H:%M").to_string()),
            collection_time_to: to.map(|t| t.format("%H:%M").to_string()),
            payer_type,
            number_of_parcels: parcels,
            weight_kg: weight,
            volume_m3: form.volume_m3,
            goods_type: form.goods_type.clone(),
            notes: form.notes.clone(),
        },
        customer_infos: CustomerInfos {
            customer_code: customer_code.to_string(),
            customer_reference: form.customer_reference.clone(),
        },
        stakeholders,
        brt_spec: BrtSpec {
            service_code,
            parcels_expiry,
        },
    })
}

fn parcel_count(parcels: i64) -> Result<i32, ServiceError> {
    i32::try_from(parcels).map_err(|_| {
        ServiceError::ValidationError(format!("{} parcels exceed the supported count", parcels))
    })
}

/// Row after a carrier call, with the problems worth showing the operator.
#[derive(Debug, Clone, Serialize)]
pub struct OrmOutcome {
    pub request: orm_request::Model,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct OrmService {
    db: Arc<DbPool>,
    api: Arc<dyn OrmApi>,
    audit: AuditLog,
    customer_code: String,
}

impl OrmService {
    pub fn new(db: Arc<DbPool>, api: Arc<dyn OrmApi>, customer_code: String) -> Self {
        Self {
            audit: AuditLog::new(db.clone()),
            db,
            api,
            customer_code,
        }
    }

    pub async fn get(&self, id: i32) -> Result<orm_request::Model, ServiceError> {
        orm_request::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Pickup request", id))
    }

    pub async fn list(
        &self,
        status: Option<OrmStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<orm_request::Model>, u64), ServiceError> {
        let mut query = orm_request::Entity::find().order_by_desc(orm_request::Column::Id);
        if let Some(status) = status {
            query = query.filter(orm_request::Column::Status.eq(status));
        }
        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Submits a new pickup request. The row is written as `pending` first; a
    /// carrier rejection or timeout leaves it in `error` status.
    #[instrument(skip(self, form))]
    pub async fn create_orm(
        &self,
        form: &OrmForm,
        actor: Option<&str>,
    ) -> Result<OrmOutcome, ServiceError> {
        let payload = build_orm_payload(form, &self.customer_code, Utc::now().date_naive())?;
        let request_json = serde_json::to_string(&payload)?;

        let now = Utc::now();
        let pending = orm_request::ActiveModel {
            reservation_number: Set(None),
            status: Set(OrmStatus::Pending),
            remote_status: Set(None),
            collection_date: Set(payload.request_infos.collection_date),
            payer_type: Set(payload.request_infos.payer_type.clone()),
            number_of_parcels: Set(parcel_count(payload.request_infos.number_of_parcels)?),
            weight_kg: Set(payload.request_infos.weight_kg),
            request_payload: Set(Some(request_json.clone())),
            response_payload: Set(None),
            last_request_payload: Set(Some(request_json)),
            last_response_payload: Set(None),
            remote_payload: Set(None),
            form_payload: Set(Some(serde_json::to_string(form)?)),
            errors_payload: Set(None),
            last_synced_at: Set(None),
            created_by: Set(actor.map(str::to_string)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        debug!(orm_id = pending.id, "pickup request recorded as pending");

        let (status, reservation, remote_status, response_json, errors) =
            match self.api.create_order(&payload).await {
                Ok(response) => {
                    let errors = response.error_messages();
                    let status = if response.reservation_number.is_some() {
                        OrmStatus::Confirmed
                    } else {
                        OrmStatus::Error
                    };
                    (
                        status,
                        response.reservation_number.clone(),
                        response.status.clone(),
                        serde_json::to_string(&response)?,
                        errors,
                    )
                }
                Err(e) => (
                    OrmStatus::Error,
                    None,
                    None,
                    carrier_error_json(&e),
                    vec![e.message().to_string()],
                ),
            };

        let mut active = pending.into_active_model();
        active.reservation_number = Set(reservation.clone());
        active.status = Set(status);
        active.remote_status = Set(remote_status);
        active.response_payload = Set(Some(response_json.clone()));
        active.last_response_payload = Set(Some(response_json));
        active.errors_payload = Set(errors_json(&errors)?);
        active.updated_at = Set(Utc::now());
        let row = active.update(&*self.db).await?;

        if status == OrmStatus::Confirmed {
            info!(orm_id = row.id, reservation = ?reservation, "pickup reserved");
            self.audit
                .info(
                    format!("Pickup request {} reserved", row.id),
                    json!({ "orm_id": row.id, "reservation_number": reservation }),
                    actor,
                )
                .await;
        } else {
            warn!(orm_id = row.id, ?errors, "pickup request rejected");
            self.audit
                .error(
                    format!("Pickup request {} rejected by BRT", row.id),
                    json!({ "orm_id": row.id, "errors": errors }),
                    actor,
                )
                .await;
        }

        Ok(OrmOutcome {
            request: row,
            warnings: errors,
        })
    }

    /// Changes an existing reservation. `reservation_number` must match the row.
    #[instrument(skip(self, form))]
    pub async fn update_orm(
        &self,
        id: i32,
        reservation_number: &str,
        form: &OrmForm,
        actor: Option<&str>,
    ) -> Result<OrmOutcome, ServiceError> {
        let existing = self.get(id).await?;
        let stored = existing.reservation_number.as_deref().unwrap_or("");
        if stored.is_empty() || stored != reservation_number.trim() {
            return Err(ServiceError::ValidationError(format!(
                "reservation number {} does not belong to pickup request {}",
                reservation_number, id
            )));
        }
        if existing.status == OrmStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(
                "cancelled pickups cannot be changed".into(),
            ));
        }

        let payload = build_orm_payload(form, &self.customer_code, Utc::now().date_naive())?;
        let parcels = parcel_count(payload.request_infos.number_of_parcels)?;
        let request_json = serde_json::to_string(&payload)?;
        let result = self.api.update_order(stored, &payload).await;

        let now = Utc::now();
        let mut active = existing.clone().into_active_model();
        active.last_request_payload = Set(Some(request_json));
        active.updated_at = Set(now);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                active.last_response_payload = Set(Some(carrier_error_json(&e)));
                active.errors_payload = Set(errors_json(&[e.message().to_string()])?);
                active.update(&*self.db).await?;
                self.audit
                    .error(
                        format!("Pickup {} update rejected", stored),
                        json!({ "orm_id": id, "error": e.message() }),
                        actor,
                    )
                    .await;
                return Err(e.into());
            }
        };

        active.status = Set(OrmStatus::Updated);
        active.remote_status = Set(response.status.clone().or(existing.remote_status.clone()));
        active.collection_date = Set(payload.request_infos.collection_date);
        active.payer_type = Set(payload.request_infos.payer_type.clone());
        active.number_of_parcels = Set(parcels);
        active.weight_kg = Set(payload.request_infos.weight_kg);
        active.last_response_payload = Set(Some(serde_json::to_string(&response)?));
        active.form_payload = Set(Some(serde_json::to_string(form)?));
        active.errors_payload = Set(None);
        let mut row = active.update(&*self.db).await?;
        info!(orm_id = id, "pickup updated");

        let mut warnings = Vec::new();
        match self.sync_orm(id).await {
            Ok(synced) => row = synced,
            Err(e) => {
                warn!(orm_id = id, error = %e, "pickup sync after update failed");
                warnings.push(format!("Pickup updated but not re-synced: {}", e));
            }
        }

        Ok(OrmOutcome {
            request: row,
            warnings,
        })
    }

    /// Cancels the reservation. A refused cancellation is recorded as
    /// `cancel_failed` and returned as an error.
    #[instrument(skip(self))]
    pub async fn cancel_orm(
        &self,
        id: i32,
        actor: Option<&str>,
    ) -> Result<orm_request::Model, ServiceError> {
        let existing = self.get(id).await?;
        let reservation = self.reservation_of(&existing)?;
        if existing.status == OrmStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(
                "pickup is already cancelled".into(),
            ));
        }

        let result = self.api.cancel_order(&reservation).await;
        let mut active = existing.into_active_model();
        active.updated_at = Set(Utc::now());

        match result {
            Ok(response) => {
                active.status = Set(OrmStatus::Cancelled);
                active.remote_status = Set(response.status.clone());
                active.last_response_payload = Set(Some(serde_json::to_string(&response)?));
                active.errors_payload = Set(None);
                let row = active.update(&*self.db).await?;
                self.audit
                    .info(
                        format!("Pickup {} cancelled", reservation),
                        json!({ "orm_id": id }),
                        actor,
                    )
                    .await;
                Ok(row)
            }
            Err(e) => {
                active.status = Set(OrmStatus::CancelFailed);
                active.last_response_payload = Set(Some(carrier_error_json(&e)));
                active.errors_payload = Set(errors_json(&[e.message().to_string()])?);
                active.update(&*self.db).await?;
                self.audit
                    .error(
                        format!("Pickup {} cancellation failed", reservation),
                        json!({ "orm_id": id, "error": e.message() }),
                        actor,
                    )
                    .await;
                Err(e.into())
            }
        }
    }

    /// Pulls the carrier's view of the reservation.
    #[instrument(skip(self))]
    pub async fn sync_orm(&self, id: i32) -> Result<orm_request::Model, ServiceError> {
        let existing = self.get(id).await?;
        let reservation = self.reservation_of(&existing)?;

        let remote: OrmResponse = match self.api.get_order(&reservation).await {
            Ok(remote) => remote,
            Err(e) => {
                let mut active = existing.into_active_model();
                active.errors_payload = Set(errors_json(&[e.message().to_string()])?);
                active.updated_at = Set(Utc::now());
                active.update(&*self.db).await?;
                return Err(e.into());
            }
        };

        let now = Utc::now();
        let keep_status = matches!(
            existing.status,
            OrmStatus::Cancelled | OrmStatus::CancelFailed
        );
        let mut active = existing.into_active_model();
        if !keep_status {
            active.status = Set(OrmStatus::Synced);
        }
        active.remote_status = Set(remote.status.clone());
        active.remote_payload = Set(Some(serde_json::to_string(&remote)?));
        active.last_synced_at = Set(Some(now));
        active.updated_at = Set(now);
        Ok(active.update(&*self.db).await?)
    }

    fn reservation_of(&self, row: &orm_request::Model) -> Result<String, ServiceError> {
        row.reservation_number
            .clone()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::InvalidOperation(format!(
                    "pickup request {} has no reservation number",
                    row.id
                ))
            })
    }
}

fn carrier_error_json(error: &CarrierError) -> String {
    json!({ "error": error.message(), "rejected": error.is_rejection() }).to_string()
}

fn errors_json(errors: &[String]) -> Result<Option<String>, ServiceError> {
    if errors.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(errors)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn form() -> OrmForm {
        OrmForm {
            collection_date: NaiveDate::from_ymd_opt(2024, 5, 13),
            collection_time_from: Some("09:00".into()),
            collection_time_to: Some("12:30".into()),
            payer_type: "rq".into(),
            number_of_parcels: Some(3),
            weight_kg: Some(12.5),
            sender: OrmAddressForm {
                name: "Magazzino Nord".into(),
                address: "Via Po 4".into(),
                zip: "10100".into(),
                city: "Torino".into(),
                province: Some("to".into()),
                country: "it".into(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn builds_nested_payload_with_sender_address() {
        let payload = build_orm_payload(&form(), "1020304", today()).unwrap();
        assert_eq!(payload.request_infos.payer_type, "RQ");
        assert_eq!(payload.customer_infos.customer_code, "1020304");
        assert_eq!(payload.stakeholders.len(), 2);
        assert_eq!(payload.stakeholders[0].role, StakeholderRole::Requester);
        let sender = &payload.stakeholders[1];
        assert_eq!(sender.role, StakeholderRole::Sender);
        let address = sender.address.as_ref().unwrap();
        assert_eq!(address.country_code, "IT");
        assert_eq!(address.province.as_deref(), Some("TO"));
    }

    #[test]
    fn account_code_replaces_the_sender_address() {
        let mut form = form();
        form.sender = OrmAddressForm::default();
        form.sender_account_code = Some("7654321".into());
        let payload = build_orm_payload(&form, "1020304", today()).unwrap();
        assert!(payload.stakeholders[1].address.is_none());

        form.sender_account_code = None;
        let err = build_orm_payload(&form, "1020304", today()).unwrap_err();
        assert_matches!(err, ServiceError::InvalidForm(errors) if errors.len() == 1);
    }

    #[test]
    fn fresh_service_needs_expiry_lines() {
        let mut form = form();
        form.service_code = Some("b20".into());
        assert!(build_orm_payload(&form, "1020304", today()).is_err());

        form.parcel_expiry = Some("P1|2024-05-20\nP2;2024-05-21\n".into());
        let payload = build_orm_payload(&form, "1020304", today()).unwrap();
        assert_eq!(payload.brt_spec.parcels_expiry.len(), 2);
        assert_eq!(payload.brt_spec.parcels_expiry[1].parcel_id, "P2");
    }

    #[test]
    fn expiry_lines_report_each_bad_line() {
        let errors = parse_expiry_lines("P1|2024-13-01\nnoseparator\n|2024-01-01").unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    async fn memory_db() -> Arc<DbPool> {
        let mut options = sea_orm::ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1);
        let db = sea_orm::Database::connect(options).await.unwrap();
        crate::db::run_migrations(&db).await.unwrap();
        Arc::new(db)
    }

    #[tokio::test]
    async fn create_sends_payload_once_and_stores_reservation() {
        let mut api = crate::carrier::MockOrmApi::new();
        api.expect_create_order()
            .withf(|payload| payload.request_infos.number_of_parcels == 3)
            .times(1)
            .returning(|_| {
                Ok(OrmResponse {
                    reservation_number: Some("R-77".into()),
                    ..Default::default()
                })
            });
        api.expect_get_order().never();

        let service = OrmService::new(memory_db().await, Arc::new(api), "1020304".into());
        let mut form = form();
        form.collection_date = Some(Utc::now().date_naive());

        let outcome = service.create_orm(&form, Some("ops")).await.unwrap();
        assert_eq!(outcome.request.status, OrmStatus::Confirmed);
        assert_eq!(outcome.request.reservation_number.as_deref(), Some("R-77"));
        assert_eq!(outcome.request.created_by.as_deref(), Some("ops"));
    }

    /// Answers every call with a timeout after noting which rows already exist.
    struct TimingOutOrmApi {
        db: Arc<DbPool>,
        seen: std::sync::Mutex<Vec<OrmStatus>>,
    }

    #[async_trait::async_trait]
    impl OrmApi for TimingOutOrmApi {
        async fn create_order(&self, _payload: &OrmPayload) -> Result<OrmResponse, CarrierError> {
            let rows = orm_request::Entity::find().all(&*self.db).await.unwrap();
            self.seen
                .lock()
                .unwrap()
                .extend(rows.into_iter().map(|row| row.status));
            Err(CarrierError::Transport("operation timed out".into()))
        }

        async fn update_order(
            &self,
            _reservation_number: &str,
            _payload: &OrmPayload,
        ) -> Result<OrmResponse, CarrierError> {
            Err(CarrierError::Transport("operation timed out".into()))
        }

        async fn get_order(&self, _reservation_number: &str) -> Result<OrmResponse, CarrierError> {
            Err(CarrierError::Transport("operation timed out".into()))
        }

        async fn cancel_order(&self, _reservation_number: &str) -> Result<OrmResponse, CarrierError> {
            Err(CarrierError::Transport("operation timed out".into()))
        }
    }

    #[tokio::test]
    async fn create_records_pending_row_before_calling_brt() {
        let db = memory_db().await;
        let api = Arc::new(TimingOutOrmApi {
            db: db.clone(),
            seen: Default::default(),
        });
        let service = OrmService::new(db.clone(), api.clone(), "1020304".into());
        let mut form = form();
        form.collection_date = Some(Utc::now().date_naive());

        let outcome = service.create_orm(&form, None).await.unwrap();

        assert_eq!(*api.seen.lock().unwrap(), vec![OrmStatus::Pending]);
        assert_eq!(outcome.request.status, OrmStatus::Error);
        assert!(outcome
            .request
            .errors_payload
            .as_deref()
            .unwrap_or_default()
            .contains("timed out"));
        assert_eq!(orm_request::Entity::find().count(&*db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn parcel_count_beyond_column_range_is_refused_before_brt() {
        let mut api = crate::carrier::MockOrmApi::new();
        api.expect_create_order().never();
        let db = memory_db().await;
        let service = OrmService::new(db.clone(), Arc::new(api), "1020304".into());
        let mut form = form();
        form.collection_date = Some(Utc::now().date_naive());
        form.number_of_parcels = Some(i64::from(i32::MAX) + 1);

        let err = service.create_orm(&form, None).await.unwrap_err();

        assert_matches!(err, ServiceError::ValidationError(_));
        assert_eq!(orm_request::Entity::find().count(&*db).await.unwrap(), 0);
        assert_eq!(parcel_count(4).unwrap(), 4);
    }

    #[test]
    fn past_dates_and_inverted_windows_are_rejected() {
        let mut form = form();
        form.collection_date = NaiveDate::from_ymd_opt(2024, 5, 9);
        form.collection_time_from = Some("14:00".into());
        form.collection_time_to = Some("10:00".into());
        let err = build_orm_payload(&form, "1020304", today()).unwrap_err();
        assert_matches!(err, ServiceError::InvalidForm(errors) if errors.len() == 2);
    }
}
