//! Batching of shipments into manifests.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, LoaderTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::carrier::{ManifestApi, ManifestRequest, ManifestShipmentRef, ShipmentApi};
use crate::config::ManifestConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::models::manifest;
use crate::models::shipment::{self, ShipmentStatus};
use crate::services::artifacts::{ArtifactStore, MANIFESTS_DIR};
use crate::services::audit::AuditLog;
use crate::services::documents::{DocumentRenderer, ManifestDocumentData, ManifestRow};
use crate::services::financial::FinancialBridge;
use crate::services::shipment_store::ShipmentStore;

#[derive(Debug, Clone, Serialize)]
pub struct ManifestView {
    #[serde(flatten)]
    pub manifest: manifest::Model,
    pub shipments: Vec<shipment::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestOutcome {
    #[serde(flatten)]
    pub view: ManifestView,
    /// Shipments dropped from the batch and other non-fatal problems
    pub warnings: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Totals {
    parcels: i32,
    weight_kg: f64,
    volume_m3: f64,
}

fn totals(shipments: &[shipment::Model]) -> Totals {
    shipments.iter().fold(Totals::default(), |acc, s| Totals {
        parcels: acc.parcels + s.number_of_parcels,
        weight_kg: acc.weight_kg + s.weight_kg,
        volume_m3: acc.volume_m3 + s.volume_m3.unwrap_or(0.0),
    })
}

#[derive(Clone)]
pub struct ManifestBuilder {
    db: Arc<DbPool>,
    carrier: Arc<dyn ShipmentApi>,
    official: Arc<dyn ManifestApi>,
    artifacts: Arc<ArtifactStore>,
    renderer: Arc<dyn DocumentRenderer>,
    store: ShipmentStore,
    financial: FinancialBridge,
    audit: AuditLog,
    config: ManifestConfig,
}

impl ManifestBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DbPool>,
        carrier: Arc<dyn ShipmentApi>,
        official: Arc<dyn ManifestApi>,
        artifacts: Arc<ArtifactStore>,
        renderer: Arc<dyn DocumentRenderer>,
        financial: FinancialBridge,
        config: ManifestConfig,
    ) -> Self {
        Self {
            store: ShipmentStore::new(db.clone()),
            audit: AuditLog::new(db.clone()),
            db,
            carrier,
            official,
            artifacts,
            renderer,
            financial,
            config,
        }
    }

    #[instrument(skip(self))]
    pub async fn generate_manifest_for_shipments(
        &self,
        ids: &[i32],
        actor: Option<&str>,
    ) -> Result<ManifestOutcome, ServiceError> {
        let requested: BTreeSet<i32> = ids.iter().copied().collect();
        if requested.is_empty() {
            return Err(ServiceError::ValidationError(
                "select at least one shipment".into(),
            ));
        }

        let candidates = shipment::Entity::find()
            .filter(shipment::Column::Id.is_in(requested.iter().copied()))
            .filter(shipment::Column::ManifestId.is_null())
            .filter(shipment::Column::DeletedAt.is_null())
            .filter(shipment::Column::Status.is_in(ShipmentStatus::manifestable()))
            .order_by_asc(shipment::Column::Id)
            .all(&*self.db)
            .await?;

        if candidates.len() != requested.len() {
            let found: BTreeSet<i32> = candidates.iter().map(|s| s.id).collect();
            let rejected: Vec<String> = requested
                .difference(&found)
                .map(|id| id.to_string())
                .collect();
            return Err(ServiceError::InvalidOperation(format!(
                "shipments {} are missing, cancelled or already manifested",
                rejected.join(", ")
            )));
        }

        let mut warnings = Vec::new();
        let mut batch = Vec::with_capacity(candidates.len());
        for shipment in candidates {
            if shipment.status != ShipmentStatus::Created {
                batch.push(shipment);
                continue;
            }
            match self.confirm_for_manifest(&shipment, actor).await {
                Ok(confirmed) => batch.push(confirmed),
                Err(message) => warnings.push(message),
            }
        }

        if batch.is_empty() {
            return Err(ServiceError::InvalidOperation(format!(
                "no shipment left to manifest: {}",
                warnings.join("; ")
            )));
        }

        let generated_at = Utc::now();
        let reference = format!(
            "{}{}",
            self.config.reference_prefix,
            generated_at.format("%Y%m%d%H%M%S%3f")
        );
        let totals = totals(&batch);

        let document = ManifestDocumentData {
            reference: reference.clone(),
            sender_customer_code: batch[0].sender_customer_code.clone(),
            departure_depot: batch[0].departure_depot.clone(),
            generated_at,
            rows: batch
                .iter()
                .map(|s| ManifestRow {
                    numeric_reference: s.numeric_reference,
                    alphanumeric_reference: s.alphanumeric_reference.clone(),
                    consignee_name: s.consignee_name.clone(),
                    consignee_city: s.consignee_city.clone(),
                    consignee_country: s.consignee_country.clone(),
                    parcels: s.number_of_parcels,
                    weight_kg: s.weight_kg,
                    volume_m3: s.volume_m3.unwrap_or(0.0),
                })
                .collect(),
            total_parcels: totals.parcels,
            total_weight_kg: totals.weight_kg,
            total_volume_m3: totals.volume_m3,
        };
        let pdf = self.renderer.render_manifest(&document)?;
        let local = self
            .artifacts
            .write_document(MANIFESTS_DIR, &reference, &pdf)
            .await?;
        if let Some(backup_error) = &local.backup_error {
            warnings.push(backup_error.clone());
        }
        let mut written = vec![local.path.clone()];

        let mut official_number = None;
        let mut official_url = None;
        let mut official_pdf_path = None;
        if self.config.official_enabled {
            let request = ManifestRequest {
                sender_customer_code: document.sender_customer_code.clone(),
                departure_depot: document.departure_depot.clone(),
                shipments: batch
                    .iter()
                    .map(|s| ManifestShipmentRef {
                        numeric_sender_reference: s.numeric_reference,
                        alphanumeric_sender_reference: s.alphanumeric_reference.clone(),
                        number_of_parcels: i64::from(s.number_of_parcels),
                        weight_kg: s.weight_kg,
                    })
                    .collect(),
            };
            match self.official.generate_official_manifest(&request).await {
                Ok(official) => {
                    official_number = official.manifest_number;
                    official_url = official.manifest_url;
                    if let Some(stream) = official.pdf_stream.as_deref() {
                        match self.store_official_pdf(&reference, stream).await {
                            Ok(path) => {
                                written.push(path.clone());
                                official_pdf_path = Some(path);
                            }
                            Err(e) => warnings.push(format!(
                                "Official manifest document could not be saved: {}",
                                e
                            )),
                        }
                    }
                }
                Err(e) => {
                    let message = format!("Official BRT manifest not generated: {}", e.message());
                    warn!(%reference, error = %e, "official manifest request failed");
                    self.audit
                        .warning(message.clone(), json!({ "reference": reference }), actor)
                        .await;
                    warnings.push(message);
                }
            }
        }

        let batch_ids: Vec<i32> = batch.iter().map(|s| s.id).collect();
        let saved = match self
            .persist(
                &reference,
                &batch_ids,
                totals,
                generated_at,
                &local.path,
                official_number,
                official_url,
                official_pdf_path,
                actor,
            )
            .await
        {
            Ok(saved) => saved,
            Err(e) => {
                for path in &written {
                    self.artifacts.delete(path).await;
                }
                self.audit
                    .error(
                        format!("Manifest {} could not be saved", reference),
                        json!({ "reference": reference, "shipments": batch_ids, "error": e.to_string() }),
                        actor,
                    )
                    .await;
                return Err(e);
            }
        };

        let shipments = shipment::Entity::find()
            .filter(shipment::Column::ManifestId.eq(saved.id))
            .order_by_asc(shipment::Column::Id)
            .all(&*self.db)
            .await?;

        info!(
            manifest_id = saved.id,
            %reference,
            shipments = shipments.len(),
            parcels = totals.parcels,
            "manifest generated"
        );
        self.audit
            .info(
                format!("Manifest {} generated", reference),
                json!({
                    "manifest_id": saved.id,
                    "shipments": batch_ids,
                    "warnings": warnings,
                }),
                actor,
            )
            .await;
        self.artifacts.cleanup_expired().await;

        Ok(ManifestOutcome {
            view: ManifestView {
                manifest: saved,
                shipments,
            },
            warnings,
        })
    }

    /// Confirms a `created` shipment on the carrier side. An "already confirmed"
    /// rejection counts as success.
    async fn confirm_for_manifest(
        &self,
        shipment: &shipment::Model,
        actor: Option<&str>,
    ) -> Result<shipment::Model, String> {
        let result = self.carrier.confirm_shipment(&shipment.carrier_key()).await;
        match result {
            Ok(_) => {}
            Err(e) if e.is_already_confirmed() => {
                info!(shipment_id = shipment.id, "shipment was already confirmed");
            }
            Err(e) => {
                let message = format!(
                    "Shipment {} (reference {}) left out: confirmation failed: {}",
                    shipment.id,
                    shipment.numeric_reference,
                    e.message()
                );
                warn!(shipment_id = shipment.id, error = %e, "confirmation before manifest failed");
                self.audit
                    .warning(
                        message.clone(),
                        json!({ "shipment_id": shipment.id, "error": e.message() }),
                        actor,
                    )
                    .await;
                return Err(message);
            }
        }

        let confirmed = self
            .store
            .mark_confirmed(shipment.id)
            .await
            .map_err(|e| format!("Shipment {} could not be updated: {}", shipment.id, e))?;
        if let Err(e) = self.financial.ensure_financial_entry(confirmed.id, false).await {
            warn!(shipment_id = confirmed.id, error = %e, "ledger entry not recorded");
        }
        Ok(confirmed)
    }

    async fn store_official_pdf(&self, reference: &str, stream: &str) -> Result<String, ServiceError> {
        let compact: String = stream.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| ServiceError::InvalidOperation(format!("manifest stream is not base64: {}", e)))?;
        let stem = format!("{}_official", reference);
        Ok(self
            .artifacts
            .write_document(MANIFESTS_DIR, &stem, &bytes)
            .await?
            .path)
    }

    /// Inserts the manifest and links the shipments in one transaction.
    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        reference: &str,
        shipment_ids: &[i32],
        totals: Totals,
        generated_at: chrono::DateTime<Utc>,
        pdf_path: &str,
        official_number: Option<String>,
        official_url: Option<String>,
        official_pdf_path: Option<String>,
        actor: Option<&str>,
    ) -> Result<manifest::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let saved = manifest::ActiveModel {
            reference: Set(reference.to_string()),
            official_number: Set(official_number),
            official_url: Set(official_url),
            official_pdf_path: Set(official_pdf_path),
            pdf_path: Set(Some(pdf_path.to_string())),
            generated_at: Set(generated_at),
            shipment_count: Set(shipment_ids.len() as i32),
            parcel_count: Set(totals.parcels),
            total_weight_kg: Set(totals.weight_kg),
            total_volume_m3: Set(totals.volume_m3),
            created_by: Set(actor.map(str::to_string)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let assigned = shipment::Entity::update_many()
            .col_expr(shipment::Column::ManifestId, Expr::value(saved.id))
            .col_expr(shipment::Column::ManifestGeneratedAt, Expr::value(generated_at))
            .col_expr(shipment::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(shipment::Column::Id.is_in(shipment_ids.iter().copied()))
            .filter(shipment::Column::ManifestId.is_null())
            .exec(&txn)
            .await?;

        if assigned.rows_affected != shipment_ids.len() as u64 {
            txn.rollback().await?;
            return Err(ServiceError::Conflict(
                "some shipments were manifested concurrently".into(),
            ));
        }

        txn.commit().await?;
        Ok(saved)
    }

    pub async fn get(&self, id: i32) -> Result<ManifestView, ServiceError> {
        let manifest = manifest::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Manifest", id))?;
        let shipments = shipment::Entity::find()
            .filter(shipment::Column::ManifestId.eq(id))
            .order_by_asc(shipment::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(ManifestView {
            manifest,
            shipments,
        })
    }

    /// Newest first, each with its shipments.
    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ManifestView>, u64), ServiceError> {
        let paginator = manifest::Entity::find()
            .order_by_desc(manifest::Column::Id)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let manifests = paginator.fetch_page(page.saturating_sub(1)).await?;
        let shipments = manifests.load_many(shipment::Entity, &*self.db).await?;

        let views = manifests
            .into_iter()
            .zip(shipments)
            .map(|(manifest, shipments)| ManifestView {
                manifest,
                shipments,
            })
            .collect();
        Ok((views, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(parcels: i32, weight: f64, volume: Option<f64>) -> shipment::Model {
        let now = Utc::now();
        shipment::Model {
            id: 1,
            sender_customer_code: "1".into(),
            numeric_reference: 1,
            alphanumeric_reference: None,
            departure_depot: None,
            arrival_terminal: None,
            arrival_depot: None,
            delivery_zone: None,
            parcel_number_from: None,
            parcel_number_to: None,
            number_of_parcels: parcels,
            weight_kg: weight,
            volume_m3: volume,
            consignee_name: "X".into(),
            consignee_address: "Y".into(),
            consignee_zip: "00100".into(),
            consignee_city: "Roma".into(),
            consignee_province: None,
            consignee_country: "IT".into(),
            consignee_email: None,
            consignee_phone: None,
            status: ShipmentStatus::Confirmed,
            execution_code: Some(0),
            execution_description: None,
            execution_message: None,
            label_path: None,
            parcel_id: None,
            tracking_id: None,
            tracking_payload: None,
            tracking_updated_at: None,
            manifest_id: None,
            manifest_generated_at: None,
            confirmed_at: None,
            deleted_at: None,
            request_payload: None,
            response_payload: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn totals_sum_the_batch() {
        let t = totals(&[row(2, 3.5, Some(0.01)), row(1, 1.0, None)]);
        assert_eq!(t.parcels, 3);
        assert!((t.weight_kg - 4.5).abs() < f64::EPSILON);
        assert!((t.volume_m3 - 0.01).abs() < f64::EPSILON);
    }
}
