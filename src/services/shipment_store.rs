//! Persistence of shipment rows.
//!
//! The carrier response is mapped over the request that produced it: a value the
//! carrier returned wins, the request value is the fallback. On updates, fields
//! only the carrier knows (routing, parcel numbering) fall back to what the row
//! already holds.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::carrier::{CreateData, CreateResponse, TrackingResponse};
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::models::shipment::{self, ShipmentStatus};
use crate::services::payload::{serialize_request_payload, ShipmentMeta};

const MAX_ALPHANUMERIC_REFERENCE: usize = 80;

/// Which derived fields survive a record update. Anything not preserved is nulled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    pub preserve_label: bool,
    pub preserve_tracking: bool,
    pub preserve_confirmation: bool,
}

impl UpdateOptions {
    /// The carrier accepted the changes on the existing shipment.
    pub fn in_place_update() -> Self {
        Self {
            preserve_label: true,
            preserve_tracking: true,
            preserve_confirmation: true,
        }
    }

    /// The carrier shipment was deleted and created again. The old label stays
    /// referenced until a new one is attached.
    pub fn recreate() -> Self {
        Self {
            preserve_label: true,
            preserve_tracking: false,
            preserve_confirmation: false,
        }
    }

    /// A fresh label was printed for an unchanged shipment. The old label stays
    /// linked until the new file is saved.
    pub fn reprint_refresh() -> Self {
        Self {
            preserve_label: true,
            preserve_tracking: true,
            preserve_confirmation: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipmentFilter {
    pub status: Option<ShipmentStatus>,
    /// Only shipments not yet assigned to a manifest
    pub unmanifested: bool,
}

#[derive(Clone)]
pub struct ShipmentStore {
    db: Arc<DbPool>,
}

impl ShipmentStore {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn find(&self, id: i32) -> Result<Option<shipment::Model>, ServiceError> {
        Ok(shipment::Entity::find_by_id(id).one(&*self.db).await?)
    }

    pub async fn get(&self, id: i32) -> Result<shipment::Model, ServiceError> {
        self.find(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Shipment", id))
    }

    pub async fn find_by_reference(
        &self,
        sender_customer_code: &str,
        numeric_reference: i64,
    ) -> Result<Option<shipment::Model>, ServiceError> {
        find_by_reference(&*self.db, sender_customer_code, numeric_reference).await
    }

    /// Newest first.
    pub async fn list(
        &self,
        filter: &ShipmentFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<shipment::Model>, u64), ServiceError> {
        let mut query = shipment::Entity::find().order_by_desc(shipment::Column::Id);
        if let Some(status) = filter.status {
            query = query.filter(shipment::Column::Status.eq(status));
        }
        if filter.unmanifested {
            query = query.filter(shipment::Column::ManifestId.is_null());
        }
        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Inserts the row for a shipment the carrier just created and returns its id.
    #[instrument(skip_all, fields(sender = %create.sender_customer_code))]
    pub async fn store_shipment(
        &self,
        create: &CreateData,
        response: &CreateResponse,
        meta: &ShipmentMeta,
    ) -> Result<i32, ServiceError> {
        let txn = self.db.begin().await?;

        let now = Utc::now();
        let mut active = shipment::ActiveModel {
            label_path: Set(None),
            tracking_payload: Set(None),
            tracking_updated_at: Set(None),
            manifest_id: Set(None),
            manifest_generated_at: Set(None),
            confirmed_at: Set(None),
            deleted_at: Set(None),
            parcel_id: Set(None),
            tracking_id: Set(None),
            created_by: Set(meta.created_by.clone()),
            created_at: Set(now),
            ..Default::default()
        };
        let mapped = map_response(create, response, meta, None)?;
        ensure_identity_free(&txn, &mapped.sender_customer_code, mapped.numeric_reference, None)
            .await?;
        mapped.apply(&mut active, now);

        let saved = active.insert(&txn).await?;
        txn.commit().await?;

        info!(
            shipment_id = saved.id,
            reference = saved.numeric_reference,
            status = %saved.status,
            "shipment stored"
        );
        Ok(saved.id)
    }

    /// Rewrites a row after the carrier-side shipment changed. Manifest linkage
    /// and the cancellation marker are always cleared.
    #[instrument(skip(self, create, response, meta))]
    pub async fn update_shipment_record(
        &self,
        id: i32,
        create: &CreateData,
        response: &CreateResponse,
        meta: &ShipmentMeta,
        options: UpdateOptions,
    ) -> Result<shipment::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let existing = shipment::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Shipment", id))?;

        let mut mapped = map_response(create, response, meta, Some(&existing))?;
        ensure_identity_free(
            &txn,
            &mapped.sender_customer_code,
            mapped.numeric_reference,
            Some(id),
        )
        .await?;

        if options.preserve_confirmation && existing.confirmed_at.is_some() {
            mapped.status = ShipmentStatus::Confirmed;
        }

        let now = Utc::now();
        let mut active = existing.clone().into_active_model();
        mapped.apply(&mut active, now);

        if !options.preserve_label {
            active.label_path = Set(None);
        }
        if !options.preserve_tracking {
            active.tracking_payload = Set(None);
            active.tracking_updated_at = Set(None);
        }
        if !options.preserve_confirmation {
            active.confirmed_at = Set(None);
        }
        active.deleted_at = Set(None);
        active.manifest_id = Set(None);
        active.manifest_generated_at = Set(None);

        let saved = active.update(&txn).await?;
        txn.commit().await?;
        debug!(shipment_id = id, ?options, "shipment record updated");
        Ok(saved)
    }

    pub async fn mark_confirmed(&self, id: i32) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(id).await?;
        let now = Utc::now();
        let mut active = existing.into_active_model();
        active.status = Set(ShipmentStatus::Confirmed);
        active.confirmed_at = Set(Some(now));
        active.updated_at = Set(now);
        Ok(active.update(&*self.db).await?)
    }

    /// Local cancellation: the row stays for history, flagged as deleted.
    pub async fn soft_cancel(&self, id: i32) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(id).await?;
        let now = Utc::now();
        let mut active = existing.into_active_model();
        active.status = Set(ShipmentStatus::Cancelled);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        Ok(active.update(&*self.db).await?)
    }

    pub async fn hard_delete(&self, id: i32) -> Result<(), ServiceError> {
        let result = shipment::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Shipment", id));
        }
        Ok(())
    }

    pub async fn attach_label(
        &self,
        id: i32,
        label_path: &str,
        parcel_id: Option<&str>,
        tracking_id: Option<&str>,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut active = existing.clone().into_active_model();
        active.label_path = Set(Some(label_path.to_string()));
        if let Some(parcel_id) = parcel_id {
            active.parcel_id = Set(Some(parcel_id.to_string()));
        }
        if let Some(tracking_id) = tracking_id {
            active.tracking_id = Set(Some(tracking_id.to_string()));
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn detach_label(&self, id: i32) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut active = existing.into_active_model();
        active.label_path = Set(None);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn store_tracking(
        &self,
        id: i32,
        tracking: &TrackingResponse,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = self.get(id).await?;
        let now = Utc::now();
        let mut active = existing.into_active_model();
        active.tracking_payload = Set(Some(serde_json::to_string(tracking)?));
        active.tracking_updated_at = Set(Some(now));
        active.updated_at = Set(now);
        Ok(active.update(&*self.db).await?)
    }
}

pub async fn find_by_reference<C: ConnectionTrait>(
    db: &C,
    sender_customer_code: &str,
    numeric_reference: i64,
) -> Result<Option<shipment::Model>, ServiceError> {
    Ok(shipment::Entity::find()
        .filter(shipment::Column::SenderCustomerCode.eq(sender_customer_code))
        .filter(shipment::Column::NumericReference.eq(numeric_reference))
        .one(db)
        .await?)
}

async fn ensure_identity_free<C: ConnectionTrait>(
    db: &C,
    sender_customer_code: &str,
    numeric_reference: i64,
    own_id: Option<i32>,
) -> Result<(), ServiceError> {
    match find_by_reference(db, sender_customer_code, numeric_reference).await? {
        Some(other) if Some(other.id) != own_id => Err(ServiceError::Conflict(format!(
            "reference {} is already stored for sender {} (shipment {})",
            numeric_reference, sender_customer_code, other.id
        ))),
        _ => Ok(()),
    }
}

/// Column values derived from one request/response pair.
#[derive(Debug)]
struct MappedShipment {
    sender_customer_code: String,
    numeric_reference: i64,
    alphanumeric_reference: Option<String>,
    departure_depot: Option<String>,
    arrival_terminal: Option<String>,
    arrival_depot: Option<String>,
    delivery_zone: Option<String>,
    parcel_number_from: Option<String>,
    parcel_number_to: Option<String>,
    number_of_parcels: i32,
    weight_kg: f64,
    volume_m3: Option<f64>,
    consignee_name: String,
    consignee_address: String,
    consignee_zip: String,
    consignee_city: String,
    consignee_province: Option<String>,
    consignee_country: String,
    consignee_email: Option<String>,
    consignee_phone: Option<String>,
    status: ShipmentStatus,
    execution_code: Option<i64>,
    execution_description: Option<String>,
    execution_message: Option<String>,
    parcel_id: Option<String>,
    tracking_id: Option<String>,
    request_payload: String,
    response_payload: String,
}

impl MappedShipment {
    fn apply(self, active: &mut shipment::ActiveModel, now: chrono::DateTime<Utc>) {
        active.sender_customer_code = Set(self.sender_customer_code);
        active.numeric_reference = Set(self.numeric_reference);
        active.alphanumeric_reference = Set(self.alphanumeric_reference);
        active.departure_depot = Set(self.departure_depot);
        active.arrival_terminal = Set(self.arrival_terminal);
        active.arrival_depot = Set(self.arrival_depot);
        active.delivery_zone = Set(self.delivery_zone);
        active.parcel_number_from = Set(self.parcel_number_from);
        active.parcel_number_to = Set(self.parcel_number_to);
        active.number_of_parcels = Set(self.number_of_parcels);
        active.weight_kg = Set(self.weight_kg);
        active.volume_m3 = Set(self.volume_m3);
        active.consignee_name = Set(self.consignee_name);
        active.consignee_address = Set(self.consignee_address);
        active.consignee_zip = Set(self.consignee_zip);
        active.consignee_city = Set(self.consignee_city);
        active.consignee_province = Set(self.consignee_province);
        active.consignee_country = Set(self.consignee_country);
        active.consignee_email = Set(self.consignee_email);
        active.consignee_phone = Set(self.consignee_phone);
        active.status = Set(self.status);
        active.execution_code = Set(self.execution_code);
        active.execution_description = Set(self.execution_description);
        active.execution_message = Set(self.execution_message);
        if self.parcel_id.is_some() {
            active.parcel_id = Set(self.parcel_id);
        }
        if self.tracking_id.is_some() {
            active.tracking_id = Set(self.tracking_id);
        }
        active.request_payload = Set(Some(self.request_payload));
        active.response_payload = Set(Some(self.response_payload));
        active.updated_at = Set(now);
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn map_response(
    create: &CreateData,
    response: &CreateResponse,
    meta: &ShipmentMeta,
    existing: Option<&shipment::Model>,
) -> Result<MappedShipment, ServiceError> {
    let numeric_reference = response
        .numeric_sender_reference
        .or(create.numeric_sender_reference)
        .ok_or_else(|| {
            ServiceError::ValidationError("shipment has no numeric sender reference".into())
        })?;

    let sender_customer_code = response
        .sender_customer_code
        .clone()
        .or_else(|| non_empty(&create.sender_customer_code))
        .ok_or_else(|| ServiceError::ValidationError("shipment has no sender customer code".into()))?;

    let carrier_field = |from_response: &Option<String>, stored: Option<&Option<String>>| {
        from_response
            .clone()
            .or_else(|| stored.cloned().flatten())
    };

    let label = response.first_label();
    let execution = &response.execution_message;

    // Label streams live in files, not in the response column.
    let mut stored_response = response.clone();
    if let Some(labels) = stored_response.labels.as_mut() {
        for label in &mut labels.label {
            label.stream = None;
        }
    }

    Ok(MappedShipment {
        sender_customer_code,
        numeric_reference,
        alphanumeric_reference: response
            .alphanumeric_sender_reference
            .clone()
            .or_else(|| create.alphanumeric_sender_reference.clone())
            .map(|r| r.chars().take(MAX_ALPHANUMERIC_REFERENCE).collect()),
        departure_depot: response
            .departure_depot
            .clone()
            .or_else(|| create.departure_depot.clone()),
        arrival_terminal: carrier_field(
            &response.arrival_terminal,
            existing.map(|e| &e.arrival_terminal),
        ),
        arrival_depot: carrier_field(&response.arrival_depot, existing.map(|e| &e.arrival_depot)),
        delivery_zone: carrier_field(&response.delivery_zone, existing.map(|e| &e.delivery_zone)),
        parcel_number_from: carrier_field(
            &response.parcel_number_from,
            existing.map(|e| &e.parcel_number_from),
        ),
        parcel_number_to: carrier_field(
            &response.parcel_number_to,
            existing.map(|e| &e.parcel_number_to),
        ),
        number_of_parcels: response
            .number_of_parcels
            .or(create.number_of_parcels)
            .unwrap_or(1)
            .clamp(1, i64::from(i32::MAX)) as i32,
        weight_kg: response.weight_kg.or(create.weight_kg).unwrap_or(0.0),
        volume_m3: response.volume_m3.or(create.volume_m3),
        consignee_name: response
            .consignee_company_name
            .clone()
            .unwrap_or_else(|| create.consignee_company_name.clone()),
        consignee_address: response
            .consignee_address
            .clone()
            .unwrap_or_else(|| create.consignee_address.clone()),
        consignee_zip: response
            .consignee_zip_code
            .clone()
            .unwrap_or_else(|| create.consignee_zip_code.clone()),
        consignee_city: response
            .consignee_city
            .clone()
            .unwrap_or_else(|| create.consignee_city.clone()),
        consignee_province: response
            .consignee_province_abbreviation
            .clone()
            .or_else(|| create.consignee_province_abbreviation.clone()),
        // ISO code from the request; the carrier echoes its own abbreviation
        consignee_country: non_empty(&create.consignee_country)
            .or_else(|| response.consignee_country.clone())
            .unwrap_or_default()
            .to_ascii_uppercase(),
        consignee_email: create.consignee_email.clone(),
        consignee_phone: create
            .consignee_telephone
            .clone()
            .or_else(|| create.consignee_mobile_phone_number.clone()),
        status: if execution.code() == 0 {
            ShipmentStatus::Created
        } else {
            ShipmentStatus::Warning
        },
        execution_code: Some(execution.code()),
        execution_description: execution.code_desc.clone(),
        execution_message: execution.message.clone(),
        parcel_id: label.and_then(|l| l.parcel_id.clone()),
        tracking_id: label.and_then(|l| {
            l.tracking_by_parcel_id
                .clone()
                .or_else(|| l.parcel_id.clone())
        }),
        request_payload: serialize_request_payload(create, meta)?,
        response_payload: serde_json::to_string(&stored_response)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_place_update_keeps_everything() {
        let options = UpdateOptions::in_place_update();
        assert!(options.preserve_label);
        assert!(options.preserve_tracking);
        assert!(options.preserve_confirmation);
    }

    #[test]
    fn recreate_drops_tracking_and_confirmation() {
        let options = UpdateOptions::recreate();
        assert!(options.preserve_label);
        assert!(!options.preserve_tracking);
        assert!(!options.preserve_confirmation);
    }

    #[test]
    fn reprint_refresh_keeps_everything_until_the_new_label_lands() {
        let options = UpdateOptions::reprint_refresh();
        assert!(options.preserve_label);
        assert!(options.preserve_tracking);
        assert!(options.preserve_confirmation);
    }

    #[test]
    fn response_values_win_over_request() {
        let create = CreateData {
            sender_customer_code: "1020304".into(),
            numeric_sender_reference: Some(10),
            number_of_parcels: Some(1),
            weight_kg: Some(1.0),
            consignee_company_name: "Rossi".into(),
            consignee_country: "ch".into(),
            ..Default::default()
        };
        let response = CreateResponse {
            numeric_sender_reference: Some(11),
            weight_kg: Some(1.5),
            arrival_terminal: Some("105".into()),
            ..Default::default()
        };

        let mapped = map_response(&create, &response, &ShipmentMeta::default(), None).unwrap();
        assert_eq!(mapped.numeric_reference, 11);
        assert_eq!(mapped.weight_kg, 1.5);
        assert_eq!(mapped.consignee_name, "Rossi");
        assert_eq!(mapped.consignee_country, "CH");
        assert_eq!(mapped.arrival_terminal.as_deref(), Some("105"));
        assert_eq!(mapped.status, ShipmentStatus::Created);
    }

    #[test]
    fn non_zero_execution_code_is_a_warning() {
        let create = CreateData {
            sender_customer_code: "1".into(),
            numeric_sender_reference: Some(1),
            ..Default::default()
        };
        let mut response = CreateResponse::default();
        response.execution_message.code = Some(4);

        let mapped = map_response(&create, &response, &ShipmentMeta::default(), None).unwrap();
        assert_eq!(mapped.status, ShipmentStatus::Warning);
        assert_eq!(mapped.execution_code, Some(4));
    }

    #[test]
    fn missing_reference_is_rejected() {
        let create = CreateData {
            sender_customer_code: "1".into(),
            ..Default::default()
        };
        assert!(map_response(&create, &CreateResponse::default(), &ShipmentMeta::default(), None)
            .is_err());
    }
}
