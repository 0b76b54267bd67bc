//! Shipment workflows against BRT: create, edit, confirm, cancel, delete,
//! tracking, label reprint and routing quotes.
//!
//! Side effects that follow a successful carrier call (label file, customs
//! paperwork, address book, ledger entry) never fail the operation; their
//! problems come back as notices.

use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::carrier::{
    CarrierError, CreateData, CreateResponse, RoutingResponse, ShipmentApi, TrackingApi,
};
use crate::config::BrtConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::models::shipment::{self, ShipmentStatus};
use crate::services::artifacts::ArtifactStore;
use crate::services::audit::AuditLog;
use crate::services::customs::{CustomsPayload, CustomsSyncStatus, CustomsSynchronizer};
use crate::services::financial::FinancialBridge;
use crate::services::payload::decode_request_payload;
use crate::services::recipients::RecipientService;
use crate::services::references::ReferenceAllocator;
use crate::services::shipment_form::{ShipmentForm, ShipmentFormProcessor};
use crate::services::shipment_store::{ShipmentFilter, ShipmentStore, UpdateOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Message for the operator about something that happened alongside the
/// main operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentOutcome {
    pub shipment: shipment::Model,
    pub notices: Vec<Notice>,
}

/// Everything the shipment workflows talk to.
#[derive(Clone)]
pub struct ShipmentDependencies {
    pub db: Arc<DbPool>,
    pub carrier: Arc<dyn ShipmentApi>,
    pub tracking: Arc<dyn TrackingApi>,
    pub allocator: ReferenceAllocator,
    pub forms: ShipmentFormProcessor,
    pub artifacts: Arc<ArtifactStore>,
    pub customs: CustomsSynchronizer,
    pub financial: FinancialBridge,
    pub recipients: RecipientService,
    pub config: BrtConfig,
}

#[derive(Clone)]
pub struct ShipmentService {
    db: Arc<DbPool>,
    carrier: Arc<dyn ShipmentApi>,
    tracking: Arc<dyn TrackingApi>,
    store: ShipmentStore,
    allocator: ReferenceAllocator,
    forms: ShipmentFormProcessor,
    artifacts: Arc<ArtifactStore>,
    customs: CustomsSynchronizer,
    financial: FinancialBridge,
    recipients: RecipientService,
    audit: AuditLog,
    config: BrtConfig,
}

impl ShipmentService {
    pub fn new(deps: ShipmentDependencies) -> Self {
        Self {
            store: ShipmentStore::new(deps.db.clone()),
            audit: AuditLog::new(deps.db.clone()),
            db: deps.db,
            carrier: deps.carrier,
            tracking: deps.tracking,
            allocator: deps.allocator,
            forms: deps.forms,
            artifacts: deps.artifacts,
            customs: deps.customs,
            financial: deps.financial,
            recipients: deps.recipients,
            config: deps.config,
        }
    }

    pub fn store(&self) -> &ShipmentStore {
        &self.store
    }

    pub async fn get(&self, id: i32) -> Result<shipment::Model, ServiceError> {
        self.store.get(id).await
    }

    pub async fn list(
        &self,
        filter: &ShipmentFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<shipment::Model>, u64), ServiceError> {
        self.store.list(filter, page, per_page).await
    }

    /// Reserves a numeric reference to prefill a new shipment form.
    pub async fn prefill_reference(&self) -> Result<i64, ServiceError> {
        let sender = self.sender_code()?;
        self.allocator.reserve(&*self.db, &sender, 0).await
    }

    /// Absolute path of the stored label file.
    pub async fn label_file(&self, id: i32) -> Result<PathBuf, ServiceError> {
        let shipment = self.store.get(id).await?;
        let relative = shipment
            .label_path
            .ok_or_else(|| ServiceError::NotFound(format!("shipment {} has no label", id)))?;
        if !self.artifacts.exists(&relative).await {
            return Err(ServiceError::NotFound(format!(
                "label file of shipment {} is missing",
                id
            )));
        }
        self.artifacts.absolute(&relative)
    }

    #[instrument(skip(self, form))]
    pub async fn create_shipment(
        &self,
        form: &ShipmentForm,
        actor: Option<&str>,
    ) -> Result<ShipmentOutcome, ServiceError> {
        let processed = self.forms.process(form, actor)?;
        let mut request = processed.request;
        let meta = processed.meta;
        let sender = self.sender_code()?;
        let mut notices = Vec::new();

        let reference = match request.numeric_sender_reference {
            Some(value) => {
                if self.store.find_by_reference(&sender, value).await?.is_some() {
                    let next = self.allocator.reserve(&*self.db, &sender, value).await?;
                    notices.push(Notice::warning(format!(
                        "Reference {} is already stored, {} was used instead",
                        value, next
                    )));
                    next
                } else {
                    value
                }
            }
            None => self.allocator.reserve(&*self.db, &sender, 0).await?,
        };
        request.numeric_sender_reference = Some(reference);

        let response = self
            .create_with_retry(&sender, &mut request, &mut notices, actor)
            .await?;

        let id = match self.store.store_shipment(&request, &response, &meta).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "carrier shipment created but not stored, rolling back remotely");
                if let Some(key) = request_key(&request) {
                    if let Err(remote) = self.carrier.delete_shipment(&key).await {
                        error!(error = %remote, "remote rollback failed");
                    }
                }
                return Err(e);
            }
        };

        let mut shipment = self.store.get(id).await?;
        if let Some(updated) = self.attach_label(&shipment, None, &response, &mut notices).await {
            shipment = updated;
        }
        self.sync_customs(&shipment, meta.customs.as_ref(), &mut notices)
            .await;
        if let Some(recipient) = processed.recipient {
            if let Err(e) = self.recipients.upsert(recipient).await {
                warn!(error = %e, "recipient not saved");
                notices.push(Notice::warning(format!("Recipient not saved: {}", e)));
            }
        }
        if self.config.auto_confirm {
            shipment = self.auto_confirm(shipment, &mut notices, actor).await;
        }

        self.audit
            .info(
                format!("Shipment {} created", shipment.numeric_reference),
                json!({ "shipment_id": shipment.id, "status": shipment.status.as_str() }),
                actor,
            )
            .await;

        Ok(ShipmentOutcome { shipment, notices })
    }

    /// Applies a changed form. The carrier shipment is updated in place when
    /// possible, otherwise deleted and created again.
    #[instrument(skip(self, form))]
    pub async fn edit_shipment(
        &self,
        id: i32,
        form: &ShipmentForm,
        actor: Option<&str>,
    ) -> Result<ShipmentOutcome, ServiceError> {
        let existing = self.store.get(id).await?;
        if existing.is_manifested() {
            return Err(ServiceError::InvalidOperation(
                "manifested shipments cannot be changed".into(),
            ));
        }

        let processed = self.forms.process(form, actor)?;
        let mut request = processed.request;
        let mut meta = processed.meta;
        let stored = decode_request_payload(existing.request_payload.as_deref());
        meta.created_by = stored.meta.created_by.or(existing.created_by.clone());
        let sender = existing.sender_customer_code.clone();
        request.sender_customer_code = sender.clone();
        let reference = request
            .numeric_sender_reference
            .unwrap_or(existing.numeric_reference);
        request.numeric_sender_reference = Some(reference);

        let mut notices = Vec::new();
        let in_place = !existing.is_cancelled() && reference == existing.numeric_reference;

        let mut updated = None;
        if in_place {
            match self.carrier.update_shipment(&request).await {
                Ok(response) => {
                    let record = self
                        .store
                        .update_shipment_record(
                            id,
                            &request,
                            &response,
                            &meta,
                            UpdateOptions::in_place_update(),
                        )
                        .await?;
                    updated = Some((record, response));
                }
                Err(e) => {
                    warn!(shipment_id = id, error = %e, "in-place update failed, recreating");
                    notices.push(Notice::warning(format!(
                        "BRT did not accept the update ({}), the shipment was recreated",
                        e.message()
                    )));
                }
            }
        }

        let recreated = updated.is_none();
        let (mut shipment, response) = match updated {
            Some(done) => done,
            None => {
                let mut remote_deleted = false;
                if !existing.is_cancelled() {
                    match self.carrier.delete_shipment(&existing.carrier_key()).await {
                        Ok(_) => remote_deleted = true,
                        Err(e) => {
                            warn!(shipment_id = id, error = %e, "remote delete before recreate failed");
                            notices.push(Notice::warning(format!(
                                "Previous BRT shipment not deleted: {}",
                                e.message()
                            )));
                        }
                    }
                }
                let created: Result<CreateResponse, ServiceError> = async {
                    if reference != existing.numeric_reference
                        && self
                            .store
                            .find_by_reference(&sender, reference)
                            .await?
                            .is_some()
                    {
                        request.numeric_sender_reference =
                            Some(self.allocator.reserve(&*self.db, &sender, reference).await?);
                    }
                    self.create_with_retry(&sender, &mut request, &mut notices, actor)
                        .await
                }
                .await;
                let response = match created {
                    Ok(response) => response,
                    Err(e) => {
                        if remote_deleted {
                            self.retire_orphaned_row(&existing, &e, actor).await;
                        }
                        return Err(e);
                    }
                };
                let record = self
                    .store
                    .update_shipment_record(id, &request, &response, &meta, UpdateOptions::recreate())
                    .await?;
                (record, response)
            }
        };

        if recreated {
            if let Err(e) = self
                .financial
                .remove_financial_entry(&existing.sender_customer_code, existing.numeric_reference)
                .await
            {
                notices.push(Notice::warning(format!("Ledger entry not removed: {}", e)));
            }
        }

        if let Some(with_label) = self
            .attach_label(&shipment, existing.label_path.as_deref(), &response, &mut notices)
            .await
        {
            shipment = with_label;
        }
        self.sync_customs(&shipment, meta.customs.as_ref(), &mut notices)
            .await;
        if let Some(recipient) = processed.recipient {
            if let Err(e) = self.recipients.upsert(recipient).await {
                notices.push(Notice::warning(format!("Recipient not saved: {}", e)));
            }
        }
        if recreated && self.config.auto_confirm {
            shipment = self.auto_confirm(shipment, &mut notices, actor).await;
        }

        self.audit
            .info(
                format!("Shipment {} updated", shipment.numeric_reference),
                json!({ "shipment_id": id, "recreated": recreated }),
                actor,
            )
            .await;

        Ok(ShipmentOutcome { shipment, notices })
    }

    #[instrument(skip(self))]
    pub async fn confirm_shipment(
        &self,
        id: i32,
        actor: Option<&str>,
    ) -> Result<ShipmentOutcome, ServiceError> {
        let shipment = self.store.get(id).await?;
        if shipment.is_cancelled() {
            return Err(ServiceError::InvalidOperation(
                "cancelled shipments cannot be confirmed".into(),
            ));
        }
        if shipment.status == ShipmentStatus::Confirmed {
            return Ok(ShipmentOutcome {
                shipment,
                notices: vec![Notice::info("Shipment was already confirmed")],
            });
        }

        let mut notices = Vec::new();
        let confirmed = self.confirm_inner(&shipment, &mut notices, actor).await?;
        Ok(ShipmentOutcome {
            shipment: confirmed,
            notices,
        })
    }

    /// Deletes the carrier shipment and flags the row as cancelled. A failed
    /// remote delete does not stop the local cancellation.
    #[instrument(skip(self))]
    pub async fn cancel_shipment(
        &self,
        id: i32,
        actor: Option<&str>,
    ) -> Result<ShipmentOutcome, ServiceError> {
        let shipment = self.store.get(id).await?;
        if shipment.is_manifested() {
            return Err(ServiceError::InvalidOperation(
                "manifested shipments cannot be cancelled".into(),
            ));
        }
        if shipment.is_cancelled() {
            return Err(ServiceError::InvalidOperation(
                "shipment is already cancelled".into(),
            ));
        }

        let mut notices = Vec::new();
        if let Err(e) = self.carrier.delete_shipment(&shipment.carrier_key()).await {
            let message = format!(
                "BRT delete of shipment {} failed, cancelled locally only: {}",
                shipment.numeric_reference,
                e.message()
            );
            warn!(shipment_id = id, error = %e, "remote delete failed");
            self.audit
                .warning(message.clone(), json!({ "shipment_id": id }), actor)
                .await;
            notices.push(Notice::warning(message));
        }

        let cancelled = self.store.soft_cancel(id).await?;
        if let Err(e) = self
            .financial
            .remove_financial_entry(&cancelled.sender_customer_code, cancelled.numeric_reference)
            .await
        {
            notices.push(Notice::warning(format!("Ledger entry not removed: {}", e)));
        }

        self.audit
            .info(
                format!("Shipment {} cancelled", cancelled.numeric_reference),
                json!({ "shipment_id": id }),
                actor,
            )
            .await;
        Ok(ShipmentOutcome {
            shipment: cancelled,
            notices,
        })
    }

    /// Removes the row together with its label, customs files and ledger entry.
    #[instrument(skip(self))]
    pub async fn delete_shipment(
        &self,
        id: i32,
        actor: Option<&str>,
    ) -> Result<Vec<Notice>, ServiceError> {
        let shipment = self.store.get(id).await?;
        if shipment.is_manifested() {
            return Err(ServiceError::InvalidOperation(
                "manifested shipments cannot be deleted".into(),
            ));
        }

        let mut notices = Vec::new();
        if !shipment.is_cancelled() {
            match self.carrier.delete_shipment(&shipment.carrier_key()).await {
                Ok(_) => {}
                Err(e @ CarrierError::Rejected { .. }) => {
                    notices.push(Notice::warning(format!(
                        "BRT did not delete the shipment: {}",
                        e.message()
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.customs.remove_for_shipment(id).await?;
        if let Some(label) = &shipment.label_path {
            self.artifacts.delete(label).await;
        }
        if let Err(e) = self
            .financial
            .remove_financial_entry(&shipment.sender_customer_code, shipment.numeric_reference)
            .await
        {
            notices.push(Notice::warning(format!("Ledger entry not removed: {}", e)));
        }
        self.store.hard_delete(id).await?;

        self.audit
            .info(
                format!("Shipment {} deleted", shipment.numeric_reference),
                json!({ "shipment_id": id }),
                actor,
            )
            .await;
        Ok(notices)
    }

    #[instrument(skip(self))]
    pub async fn refresh_tracking(&self, id: i32) -> Result<shipment::Model, ServiceError> {
        let shipment = self.store.get(id).await?;
        let parcel = shipment
            .tracking_id
            .clone()
            .or_else(|| shipment.parcel_id.clone())
            .ok_or_else(|| {
                ServiceError::InvalidOperation("shipment has no parcel id to track".into())
            })?;

        let tracking = self.tracking.tracking_by_parcel_id(&parcel).await?;
        let updated = self.store.store_tracking(id, &tracking).await?;
        info!(
            shipment_id = id,
            events = tracking.events.len(),
            "tracking refreshed"
        );
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn reprint_label(
        &self,
        id: i32,
        actor: Option<&str>,
    ) -> Result<ShipmentOutcome, ServiceError> {
        let shipment = self.store.get(id).await?;
        if shipment.is_manifested() || shipment.is_cancelled() {
            return Err(ServiceError::InvalidOperation(
                "labels can only be reprinted for open shipments".into(),
            ));
        }

        let response = self.carrier.reprint_label(&shipment.carrier_key()).await?;
        if response.first_label().and_then(|l| l.stream.as_ref()).is_none() {
            return Err(ServiceError::InvalidOperation(
                "BRT returned no label to reprint".into(),
            ));
        }

        let stored = decode_request_payload(shipment.request_payload.as_deref());
        let request = if stored.request.numeric_sender_reference.is_some() {
            stored.request
        } else {
            request_from_model(&shipment)
        };
        let refreshed = self
            .store
            .update_shipment_record(
                id,
                &request,
                &response,
                &stored.meta,
                UpdateOptions::reprint_refresh(),
            )
            .await?;

        let mut notices = Vec::new();
        let shipment = self
            .attach_label(&refreshed, shipment.label_path.as_deref(), &response, &mut notices)
            .await
            .unwrap_or(refreshed);

        self.audit
            .info(
                format!("Label of shipment {} reprinted", shipment.numeric_reference),
                json!({ "shipment_id": id }),
                actor,
            )
            .await;
        Ok(ShipmentOutcome { shipment, notices })
    }

    /// Asks BRT how the shipment would be routed, without creating it.
    pub async fn routing_quote(&self, form: &ShipmentForm) -> Result<RoutingResponse, ServiceError> {
        let processed = self.forms.process(form, None)?;
        Ok(self.carrier.routing_quote(&processed.request).await?)
    }

    fn sender_code(&self) -> Result<String, ServiceError> {
        let sender = self.config.sender_customer_code.trim();
        if sender.is_empty() {
            return Err(ServiceError::ValidationError(
                "BRT sender customer code is not configured".into(),
            ));
        }
        Ok(sender.to_string())
    }

    /// Calls create, bumping the numeric reference each time BRT reports it as
    /// already used.
    async fn create_with_retry(
        &self,
        sender: &str,
        request: &mut CreateData,
        notices: &mut Vec<Notice>,
        actor: Option<&str>,
    ) -> Result<CreateResponse, ServiceError> {
        let attempts = self.config.reference_retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            let current = request.numeric_sender_reference.unwrap_or(0);
            match self.carrier.create_shipment(request).await {
                Ok(response) => {
                    self.allocator
                        .commit(sender, response.numeric_sender_reference.unwrap_or(current));
                    return Ok(response);
                }
                Err(e) if e.is_reference_already_used() => {
                    let next = self.allocator.reserve(&*self.db, sender, current).await?;
                    if attempt >= attempts {
                        warn!(rejected = current, suggested = next, "reference retries exhausted");
                        return Err(ServiceError::ReferenceConflict {
                            suggested: next,
                            message: e.message().to_string(),
                        });
                    }
                    info!(rejected = current, next, "reference already used, retrying");
                    notices.push(Notice::warning(format!(
                        "Reference {} was already used at BRT, {} was used instead",
                        current, next
                    )));
                    request.numeric_sender_reference = Some(next);
                    attempt += 1;
                }
                Err(e) => {
                    self.audit
                        .error(
                            "BRT rejected shipment creation",
                            json!({ "reference": current, "error": e.message() }),
                            actor,
                        )
                        .await;
                    return Err(e.into());
                }
            }
        }
    }

    async fn confirm_inner(
        &self,
        shipment: &shipment::Model,
        notices: &mut Vec<Notice>,
        actor: Option<&str>,
    ) -> Result<shipment::Model, ServiceError> {
        match self.carrier.confirm_shipment(&shipment.carrier_key()).await {
            Ok(_) => {}
            Err(e) if e.is_already_confirmed() => {
                notices.push(Notice::info("BRT already held the shipment as confirmed"));
            }
            Err(e) => {
                self.audit
                    .error(
                        format!("Confirmation of shipment {} failed", shipment.numeric_reference),
                        json!({ "shipment_id": shipment.id, "error": e.message() }),
                        actor,
                    )
                    .await;
                return Err(e.into());
            }
        }

        let confirmed = self.store.mark_confirmed(shipment.id).await?;
        if let Err(e) = self.financial.ensure_financial_entry(confirmed.id, false).await {
            warn!(shipment_id = confirmed.id, error = %e, "ledger entry not recorded");
            notices.push(Notice::warning(format!("Ledger entry not recorded: {}", e)));
        }
        self.audit
            .info(
                format!("Shipment {} confirmed", confirmed.numeric_reference),
                json!({ "shipment_id": confirmed.id }),
                actor,
            )
            .await;
        Ok(confirmed)
    }

    async fn auto_confirm(
        &self,
        shipment: shipment::Model,
        notices: &mut Vec<Notice>,
        actor: Option<&str>,
    ) -> shipment::Model {
        match self.confirm_inner(&shipment, notices, actor).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                notices.push(Notice::warning(format!(
                    "Shipment created but not confirmed: {}",
                    e.response_message()
                )));
                shipment
            }
        }
    }

    /// Stores the first label of `response` and links it. The previous file is
    /// deleted only when a new one was written under a different path.
    async fn attach_label(
        &self,
        shipment: &shipment::Model,
        previous: Option<&str>,
        response: &CreateResponse,
        notices: &mut Vec<Notice>,
    ) -> Option<shipment::Model> {
        let label = response.first_label()?;
        let stream = label.stream.as_deref()?;
        let parcel = label
            .parcel_id
            .clone()
            .unwrap_or_else(|| shipment.numeric_reference.to_string());

        let stored = match self.artifacts.save_label(&parcel, stream).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(shipment_id = shipment.id, error = %e, "label not saved");
                notices.push(Notice::warning(format!("Label not saved: {}", e)));
                return None;
            }
        };
        if let Some(backup_error) = stored.backup_error {
            notices.push(Notice::warning(backup_error));
        }

        let updated = match self
            .store
            .attach_label(
                shipment.id,
                &stored.path,
                label.parcel_id.as_deref(),
                label.tracking_by_parcel_id.as_deref(),
            )
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                self.artifacts.delete(&stored.path).await;
                notices.push(Notice::warning(format!("Label not linked: {}", e)));
                return None;
            }
        };

        if let Some(old) = previous.filter(|old| *old != stored.path) {
            self.artifacts.delete(old).await;
        }
        self.artifacts.cleanup_expired().await;
        Some(updated)
    }

    /// The carrier shipment behind `existing` was deleted and no replacement
    /// could be created: the row is cancelled so it never reaches a manifest.
    async fn retire_orphaned_row(
        &self,
        existing: &shipment::Model,
        cause: &ServiceError,
        actor: Option<&str>,
    ) {
        error!(shipment_id = existing.id, error = %cause, "recreate failed after remote delete");
        if let Err(e) = self.store.soft_cancel(existing.id).await {
            error!(shipment_id = existing.id, error = %e, "orphaned shipment not cancelled");
        }
        if let Err(e) = self
            .financial
            .remove_financial_entry(&existing.sender_customer_code, existing.numeric_reference)
            .await
        {
            warn!(shipment_id = existing.id, error = %e, "ledger entry not removed");
        }
        if let Some(label) = &existing.label_path {
            self.artifacts.delete(label).await;
            if let Err(e) = self.store.detach_label(existing.id).await {
                warn!(shipment_id = existing.id, error = %e, "label not detached");
            }
        }
        self.audit
            .error(
                format!(
                    "Shipment {} was deleted at BRT but could not be recreated, cancelled locally",
                    existing.numeric_reference
                ),
                json!({ "shipment_id": existing.id, "error": cause.to_string() }),
                actor,
            )
            .await;
    }

    async fn sync_customs(
        &self,
        shipment: &shipment::Model,
        payload: Option<&CustomsPayload>,
        notices: &mut Vec<Notice>,
    ) {
        match self
            .customs
            .sync_customs_documents(shipment.id, shipment, payload)
            .await
        {
            Ok(outcome) => match outcome.status {
                CustomsSyncStatus::Generated => {
                    notices.push(Notice::info("Customs documents generated"))
                }
                CustomsSyncStatus::Error => notices.push(Notice::warning(format!(
                    "Customs documents not generated: {}",
                    outcome.message.unwrap_or_default()
                ))),
                CustomsSyncStatus::Skipped => {}
            },
            Err(e) => {
                warn!(shipment_id = shipment.id, error = %e, "customs sync failed");
                notices.push(Notice::warning(format!("Customs documents not updated: {}", e)));
            }
        }
    }
}

fn request_key(request: &CreateData) -> Option<crate::carrier::ShipmentKey> {
    Some(crate::carrier::ShipmentKey {
        sender_customer_code: request.sender_customer_code.clone(),
        numeric_sender_reference: request.numeric_sender_reference?,
        alphanumeric_sender_reference: request.alphanumeric_sender_reference.clone(),
    })
}

/// Rebuilds a carrier request from the columns, for rows whose stored request
/// is missing or unreadable.
fn request_from_model(shipment: &shipment::Model) -> CreateData {
    CreateData {
        departure_depot: shipment.departure_depot.clone(),
        sender_customer_code: shipment.sender_customer_code.clone(),
        numeric_sender_reference: Some(shipment.numeric_reference),
        alphanumeric_sender_reference: shipment.alphanumeric_reference.clone(),
        number_of_parcels: Some(i64::from(shipment.number_of_parcels)),
        weight_kg: Some(shipment.weight_kg),
        volume_m3: shipment.volume_m3,
        consignee_company_name: shipment.consignee_name.clone(),
        consignee_address: shipment.consignee_address.clone(),
        consignee_zip_code: shipment.consignee_zip.clone(),
        consignee_city: shipment.consignee_city.clone(),
        consignee_province_abbreviation: shipment.consignee_province.clone(),
        consignee_country: shipment.consignee_country.clone(),
        consignee_email: shipment.consignee_email.clone(),
        consignee_telephone: shipment.consignee_phone.clone(),
        ..Default::default()
    }
}
