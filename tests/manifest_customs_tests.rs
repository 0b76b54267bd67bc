mod common;

use assert_matches::assert_matches;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use brt_backoffice::{
    carrier::{CarrierError, CarrierResult, ManifestApi, ManifestRequest, OfficialManifest},
    db::DbPool,
    errors::ServiceError,
    models::{
        customs_document, CustomsDocument, CustomsStatus, LedgerEntry, Manifest, Shipment,
        ShipmentStatus,
    },
    services::{
        customs::{CustomsInput, CustomsSyncStatus, CustomsSynchronizer},
        documents::{
            CustomsDocumentData, DocumentError, DocumentRenderer, ManifestDocumentData,
            PdfDocumentRenderer,
        },
        financial::{FinancialBridge, FinancialOutcome},
        manifests::ManifestBuilder,
        payload::decode_request_payload,
    },
};
use common::{domestic_form, swiss_form, FakeCarrier, TestApp};

/// Renders manifests normally but cannot produce customs paperwork.
struct BrokenCustomsRenderer;

impl DocumentRenderer for BrokenCustomsRenderer {
    fn render_invoice(&self, _data: &CustomsDocumentData) -> Result<Vec<u8>, DocumentError> {
        Err(DocumentError::InvalidInput("invoice template unavailable".into()))
    }

    fn render_declaration(&self, _data: &CustomsDocumentData) -> Result<Vec<u8>, DocumentError> {
        Err(DocumentError::InvalidInput("declaration template unavailable".into()))
    }

    fn render_manifest(&self, data: &ManifestDocumentData) -> Result<Vec<u8>, DocumentError> {
        PdfDocumentRenderer::new().render_manifest(data)
    }
}

/// Official manifest endpoint that removes one shipment row while the batch is
/// being assembled, as a concurrent operator would.
struct RowRemovingManifestApi {
    db: Arc<DbPool>,
    removed: i32,
    inner: Arc<FakeCarrier>,
}

#[async_trait]
impl ManifestApi for RowRemovingManifestApi {
    async fn generate_official_manifest(
        &self,
        request: &ManifestRequest,
    ) -> CarrierResult<OfficialManifest> {
        Shipment::delete_by_id(self.removed)
            .exec(&*self.db)
            .await
            .expect("remove shipment row");
        self.inner.generate_official_manifest(request).await
    }
}

fn files_under(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}

async fn customs_row(app: &TestApp, shipment_id: i32) -> Option<customs_document::Model> {
    CustomsDocument::find()
        .filter(customs_document::Column::ShipmentId.eq(shipment_id))
        .one(&*app.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn swiss_shipment_gets_customs_documents() {
    let app = TestApp::new().await;

    let shipment = app.create(&swiss_form(None)).await;

    let row = customs_row(&app, shipment.id).await.expect("customs row");
    assert_eq!(row.status, CustomsStatus::Generated);
    assert_eq!(row.goods_value, rust_decimal_macros::dec!(250.00));
    assert_eq!(row.goods_currency, "EUR");
    assert_eq!(row.hs_code.as_deref(), Some("420221"));
    for path in row.file_paths() {
        let bytes = std::fs::read(app.uploads().join(path)).expect("customs file exists");
        assert!(bytes.starts_with(b"%PDF"));
    }
    assert_eq!(row.file_paths().len(), 2);
}

#[tokio::test]
async fn switching_destination_removes_customs_documents() {
    let app = TestApp::new().await;
    let shipment = app.create(&swiss_form(None)).await;
    let row = customs_row(&app, shipment.id).await.expect("customs row");
    let files: Vec<_> = row
        .file_paths()
        .into_iter()
        .map(|p| app.uploads().join(p))
        .collect();

    app.services()
        .shipments
        .edit_shipment(
            shipment.id,
            &domestic_form(Some(shipment.numeric_reference)),
            None,
        )
        .await
        .expect("edited");

    assert!(customs_row(&app, shipment.id).await.is_none());
    assert!(files.iter().all(|f| !f.exists()));
}

#[tokio::test]
async fn zero_goods_value_is_refused_for_swiss_destination() {
    let app = TestApp::new().await;
    let mut form = swiss_form(None);
    form.customs = Some(CustomsInput {
        goods_value: Some("0".into()),
        ..form.customs.clone().unwrap_or_default()
    });

    let err = app
        .services()
        .shipments
        .create_shipment(&form, None)
        .await
        .expect_err("zero value");

    let ServiceError::InvalidForm(errors) = err else {
        panic!("expected InvalidForm");
    };
    assert!(errors.iter().any(|e| e.contains("goods value")));
    assert!(app.carrier.calls().is_empty());
}

#[tokio::test]
async fn domestic_shipment_ignores_customs_input() {
    let app = TestApp::new().await;
    let mut form = domestic_form(None);
    form.customs = Some(CustomsInput {
        goods_value: Some("0".into()),
        ..Default::default()
    });

    let shipment = app.create(&form).await;
    assert!(customs_row(&app, shipment.id).await.is_none());
}

#[tokio::test]
async fn deleting_shipment_removes_customs_documents() {
    let app = TestApp::new().await;
    let shipment = app.create(&swiss_form(None)).await;

    app.services()
        .shipments
        .delete_shipment(shipment.id, None)
        .await
        .unwrap();

    assert_eq!(CustomsDocument::find().count(&*app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn manifest_confirms_created_shipments_and_links_them() {
    let app = TestApp::new().await;
    let first = app.create(&domestic_form(None)).await;
    let second = app.create(&domestic_form(None)).await;

    let outcome = app
        .services()
        .manifests
        .generate_manifest_for_shipments(&[first.id, second.id], Some("tester"))
        .await
        .expect("manifest generated");

    assert!(outcome.warnings.is_empty());
    let manifest = &outcome.view.manifest;
    assert_eq!(manifest.shipment_count, 2);
    assert_eq!(manifest.parcel_count, 2);
    assert!((manifest.total_weight_kg - 5.0).abs() < 1e-9);
    assert!(manifest.reference.starts_with("BRT"));
    assert_eq!(manifest.official_number.as_deref(), Some("M-77"));
    assert_eq!(app.carrier.count("confirm"), 2);

    for shipment in &outcome.view.shipments {
        assert_eq!(shipment.status, ShipmentStatus::Confirmed);
        assert_eq!(shipment.manifest_id, Some(manifest.id));
        assert!(shipment.manifest_generated_at.is_some());
    }

    let pdf = manifest.pdf_path.as_deref().expect("local manifest pdf");
    assert!(app.uploads().join(pdf).exists());
    let official = manifest.official_pdf_path.as_deref().expect("official pdf");
    assert!(app.uploads().join(official).exists());

    assert_eq!(LedgerEntry::find().count(&*app.db).await.unwrap(), 2);
    let requests = app.carrier.manifest_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].shipments.len(), 2);
}

#[tokio::test]
async fn manifest_rejects_ineligible_shipments_without_side_effects() {
    let app = TestApp::new().await;
    let open = app.create(&domestic_form(None)).await;
    let cancelled = app.create(&domestic_form(None)).await;
    app.services()
        .shipments
        .cancel_shipment(cancelled.id, None)
        .await
        .unwrap();
    let calls_before = app.carrier.calls().len();

    let err = app
        .services()
        .manifests
        .generate_manifest_for_shipments(&[open.id, cancelled.id, 999], None)
        .await
        .expect_err("rejected");

    assert_matches!(err, ServiceError::InvalidOperation(message) if message.contains("999"));
    assert_eq!(app.carrier.calls().len(), calls_before);
    assert_eq!(Manifest::find().count(&*app.db).await.unwrap(), 0);
    assert_eq!(app.shipment(open.id).await.status, ShipmentStatus::Created);
}

#[tokio::test]
async fn manifested_shipments_cannot_be_manifested_again_or_changed() {
    let app = TestApp::new().await;
    let shipment = app.create(&domestic_form(None)).await;
    app.services()
        .manifests
        .generate_manifest_for_shipments(&[shipment.id], None)
        .await
        .unwrap();

    let again = app
        .services()
        .manifests
        .generate_manifest_for_shipments(&[shipment.id], None)
        .await;
    assert_matches!(again, Err(ServiceError::InvalidOperation(_)));

    let cancel = app.services().shipments.cancel_shipment(shipment.id, None).await;
    assert_matches!(cancel, Err(ServiceError::InvalidOperation(_)));
    let delete = app.services().shipments.delete_shipment(shipment.id, None).await;
    assert_matches!(delete, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn official_manifest_failure_keeps_local_document() {
    let app = TestApp::new().await;
    let shipment = app.create(&domestic_form(None)).await;
    app.carrier
        .push_manifest(Err(CarrierError::Transport("connection reset".into())));

    let outcome = app
        .services()
        .manifests
        .generate_manifest_for_shipments(&[shipment.id], None)
        .await
        .expect("local manifest still generated");

    assert!(outcome.view.manifest.pdf_path.is_some());
    assert!(outcome.view.manifest.official_number.is_none());
    assert!(!outcome.warnings.is_empty());
}

#[tokio::test]
async fn manifest_drops_shipments_the_carrier_will_not_confirm() {
    let app = TestApp::new().await;
    let good = app.create(&domestic_form(None)).await;
    let bad = app.create(&domestic_form(None)).await;
    app.carrier.push_confirm(Ok(common::ok_execution()));
    app.carrier
        .push_confirm(Err(CarrierError::rejected(Some(-5), "Shipment blocked")));

    let outcome = app
        .services()
        .manifests
        .generate_manifest_for_shipments(&[good.id, bad.id], None)
        .await
        .expect("partial manifest");

    assert_eq!(outcome.view.manifest.shipment_count, 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(app.shipment(bad.id).await.manifest_id.is_none());
}

#[tokio::test]
async fn financial_entry_is_idempotent() {
    let app = TestApp::new().await;
    let shipment = app.create(&domestic_form(None)).await;
    let financial = brt_backoffice::services::financial::FinancialBridge::new(
        app.db.clone(),
        app.state.config.pricing.clone(),
    );

    let skipped = financial.ensure_financial_entry(shipment.id, false).await.unwrap();
    assert_matches!(skipped, FinancialOutcome::Skipped(_));

    let created = financial.ensure_financial_entry(shipment.id, true).await.unwrap();
    assert_matches!(created, FinancialOutcome::Created(_));
    let present = financial.ensure_financial_entry(shipment.id, true).await.unwrap();
    assert_eq!(present, FinancialOutcome::AlreadyPresent);
    assert_eq!(LedgerEntry::find().count(&*app.db).await.unwrap(), 1);

    let removed = financial
        .remove_financial_entry(&shipment.sender_customer_code, shipment.numeric_reference)
        .await
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn heavy_shipment_uses_open_ended_tier() {
    let app = TestApp::new().await;
    let mut form = domestic_form(None);
    form.weight_kg = Some(42.0);
    let shipment = app.create(&form).await;

    app.services()
        .shipments
        .confirm_shipment(shipment.id, None)
        .await
        .unwrap();

    let entry = LedgerEntry::find().one(&*app.db).await.unwrap().expect("entry");
    assert_eq!(entry.amount, rust_decimal_macros::dec!(24.00));
    assert!(entry.description.contains("XL"));
}

#[tokio::test]
async fn customs_render_failure_keeps_previous_documents() {
    let app = TestApp::new().await;
    let shipment = app.create(&swiss_form(None)).await;
    let before = customs_row(&app, shipment.id).await.expect("customs row");
    assert_eq!(before.status, CustomsStatus::Generated);
    let payload = decode_request_payload(shipment.request_payload.as_deref())
        .meta
        .customs
        .expect("customs payload stored");

    let synchronizer = CustomsSynchronizer::new(
        app.db.clone(),
        app.services().artifacts.clone(),
        Arc::new(BrokenCustomsRenderer),
        app.state.config.customs.clone(),
    );
    let outcome = synchronizer
        .sync_customs_documents(shipment.id, &shipment, Some(&payload))
        .await
        .expect("sync reports the failure in its outcome");

    assert_eq!(outcome.status, CustomsSyncStatus::Error);
    assert!(outcome.message.is_some());
    let after = customs_row(&app, shipment.id).await.expect("customs row kept");
    assert_eq!(after.status, CustomsStatus::Error);
    assert_eq!(after.invoice_path, before.invoice_path);
    assert_eq!(after.declaration_path, before.declaration_path);
    assert!(after
        .last_error
        .as_deref()
        .unwrap_or_default()
        .contains("template unavailable"));
    for path in after.file_paths() {
        assert!(app.uploads().join(path).exists());
    }
}

#[tokio::test]
async fn manifest_rollback_removes_written_documents() {
    let app = TestApp::new().await;
    let kept = app.create(&domestic_form(None)).await;
    let removed = app.create(&domestic_form(None)).await;
    let config = &app.state.config;

    let builder = ManifestBuilder::new(
        app.db.clone(),
        app.carrier.clone(),
        Arc::new(RowRemovingManifestApi {
            db: app.db.clone(),
            removed: removed.id,
            inner: app.carrier.clone(),
        }),
        app.services().artifacts.clone(),
        Arc::new(PdfDocumentRenderer::new()),
        FinancialBridge::new(app.db.clone(), config.pricing.clone()),
        config.manifest.clone(),
    );

    let err = builder
        .generate_manifest_for_shipments(&[kept.id, removed.id], None)
        .await
        .expect_err("assignment no longer matches the batch");

    assert_matches!(err, ServiceError::Conflict(_));
    assert_eq!(app.carrier.count("manifest"), 1);
    assert_eq!(Manifest::find().count(&*app.db).await.unwrap(), 0);
    assert_eq!(files_under(&app.uploads().join("manifests")), 0);
    assert_eq!(files_under(&app.backups().join("manifests")), 0);
    let survivor = app.shipment(kept.id).await;
    assert!(survivor.manifest_id.is_none());
    assert!(survivor.manifest_generated_at.is_none());
}
