mod common;

use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{domestic_form, response_json, TestApp};

fn shipment_body() -> Value {
    serde_json::to_value(domestic_form(None)).unwrap()
}

#[tokio::test]
async fn liveness_and_readiness_answer() {
    let app = TestApp::new().await;

    let live = app.request(Method::GET, "/health", None).await;
    assert_eq!(live.status(), StatusCode::OK);
    assert_eq!(response_json(live).await["status"], "up");

    let ready = app.request(Method::GET, "/health/ready", None).await;
    assert_eq!(ready.status(), StatusCode::OK);
    let body = response_json(ready).await;
    assert_eq!(body["database"]["status"], "up");
}

#[tokio::test]
async fn create_and_fetch_shipment_through_the_api() {
    let app = TestApp::new().await;

    let created = app
        .request(Method::POST, "/api/v1/brt/shipments", Some(shipment_body()))
        .await;
    assert_eq!(created.status(), StatusCode::OK);
    let body = response_json(created).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["shipment"]["status"], "created");
    assert_eq!(body["data"]["shipment"]["created_by"], "tester");
    assert!(body["meta"]["request_id"].is_string());
    let id = body["data"]["shipment"]["id"].as_i64().unwrap();

    let fetched = app
        .request(Method::GET, &format!("/api/v1/brt/shipments/{}", id), None)
        .await;
    assert_eq!(fetched.status(), StatusCode::OK);
    let body = response_json(fetched).await;
    assert_eq!(body["data"]["numeric_reference"], 1);

    let listed = app
        .request(Method::GET, "/api/v1/brt/shipments?status=created&limit=5", None)
        .await;
    let body = response_json(listed).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["limit"], 5);
    assert_eq!(body["data"]["total_pages"], 1);
}

#[tokio::test]
async fn invalid_form_lists_errors() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/brt/shipments",
            Some(json!({ "consignee_country": "IT", "weight_kg": 0 })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    let errors = body["details"]["errors"].as_array().expect("error list");
    assert!(errors.len() >= 4);
}

#[tokio::test]
async fn unknown_shipment_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/brt/shipments/4242", None)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn unknown_status_filter_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/brt/shipments?status=lost", None)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reference_conflict_returns_suggestion() {
    let app = TestApp::new().await;
    for _ in 0..3 {
        app.carrier
            .push_create(Err(common::rejected("reference already used")));
    }

    let response = app
        .request(Method::POST, "/api/v1/brt/shipments", Some(shipment_body()))
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["details"]["suggested_reference"], 4);
}

#[tokio::test]
async fn carrier_rejection_maps_to_unprocessable() {
    let app = TestApp::new().await;
    app.carrier
        .push_create(Err(common::rejected("Consignee address not valid")));

    let response = app
        .request(Method::POST, "/api/v1/brt/shipments", Some(shipment_body()))
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn next_reference_reserves_increasing_values() {
    let app = TestApp::new().await;

    let first = response_json(
        app.request(Method::GET, "/api/v1/brt/shipments/next-reference", None)
            .await,
    )
    .await;
    let second = response_json(
        app.request(Method::GET, "/api/v1/brt/shipments/next-reference", None)
            .await,
    )
    .await;

    assert_eq!(first["data"]["sender_customer_code"], common::SENDER);
    assert_eq!(first["data"]["numeric_reference"], 1);
    assert_eq!(second["data"]["numeric_reference"], 2);
}

#[tokio::test]
async fn label_download_serves_pdf() {
    let app = TestApp::new().await;
    let shipment = app.create(&domestic_form(None)).await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/brt/shipments/{}/label", shipment.id),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/pdf"
    );
}

#[tokio::test]
async fn shipment_actions_over_http() {
    let app = TestApp::new().await;
    let shipment = app.create(&domestic_form(None)).await;

    let confirmed = app
        .request(
            Method::POST,
            &format!("/api/v1/brt/shipments/{}/confirm", shipment.id),
            None,
        )
        .await;
    assert_eq!(confirmed.status(), StatusCode::OK);
    assert_eq!(
        response_json(confirmed).await["data"]["shipment"]["status"],
        "confirmed"
    );

    let tracked = app
        .request(
            Method::POST,
            &format!("/api/v1/brt/shipments/{}/tracking", shipment.id),
            None,
        )
        .await;
    assert_eq!(tracked.status(), StatusCode::OK);

    let cancelled = app
        .request(
            Method::POST,
            &format!("/api/v1/brt/shipments/{}/cancel", shipment.id),
            None,
        )
        .await;
    assert_eq!(
        response_json(cancelled).await["data"]["shipment"]["status"],
        "cancelled"
    );

    let deleted = app
        .request(
            Method::DELETE,
            &format!("/api/v1/brt/shipments/{}", shipment.id),
            None,
        )
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    assert_eq!(response_json(deleted).await["data"]["id"], shipment.id);
    assert_eq!(app.carrier.count("delete"), 1);
}

#[tokio::test]
async fn routing_quote_does_not_create_anything() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/brt/shipments/routing-quote",
            Some(shipment_body()),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["arrivalDepot"], "201");
    assert_eq!(app.carrier.count("create"), 0);
}

#[tokio::test]
async fn manifest_endpoints_round_trip() {
    let app = TestApp::new().await;
    let shipment = app.create(&domestic_form(None)).await;

    let empty = app
        .request(
            Method::POST,
            "/api/v1/brt/manifests",
            Some(json!({ "shipment_ids": [] })),
        )
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let created = app
        .request(
            Method::POST,
            "/api/v1/brt/manifests",
            Some(json!({ "shipment_ids": [shipment.id] })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::OK);
    let body = response_json(created).await;
    let manifest_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["shipments"].as_array().unwrap().len(), 1);

    let listed = response_json(app.request(Method::GET, "/api/v1/brt/manifests", None).await).await;
    assert_eq!(listed["data"]["total"], 1);

    let local = app
        .request(
            Method::GET,
            &format!("/api/v1/brt/manifests/{}/document", manifest_id),
            None,
        )
        .await;
    assert_eq!(local.status(), StatusCode::OK);
    let official = app
        .request(
            Method::GET,
            &format!("/api/v1/brt/manifests/{}/document?kind=official", manifest_id),
            None,
        )
        .await;
    assert_eq!(official.status(), StatusCode::OK);
}

#[tokio::test]
async fn pickup_endpoints() {
    let app = TestApp::new().await;
    let tomorrow = (chrono::Utc::now().date_naive() + chrono::Duration::days(1)).to_string();

    let created = app
        .request(
            Method::POST,
            "/api/v1/brt/orm",
            Some(json!({
                "collection_date": tomorrow,
                "payer_type": "SE",
                "number_of_parcels": "2",
                "weight_kg": "7,5",
                "sender_account_code": "0998877"
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::OK);
    let body = response_json(created).await;
    assert_eq!(body["data"]["request"]["status"], "confirmed");
    let id = body["data"]["request"]["id"].as_i64().unwrap();

    let synced = app
        .request(Method::POST, &format!("/api/v1/brt/orm/{}/sync", id), None)
        .await;
    assert_eq!(response_json(synced).await["data"]["status"], "synced");

    let listed = app
        .request(Method::GET, "/api/v1/brt/orm?status=synced", None)
        .await;
    assert_eq!(response_json(listed).await["data"]["total"], 1);

    let cancelled = app
        .request(Method::POST, &format!("/api/v1/brt/orm/{}/cancel", id), None)
        .await;
    assert_eq!(response_json(cancelled).await["data"]["status"], "cancelled");
}

#[tokio::test]
async fn recipients_crud() {
    let app = TestApp::new().await;

    let saved = app
        .request(
            Method::POST,
            "/api/v1/brt/recipients",
            Some(json!({
                "label": "Rossi",
                "company_name": "Rossi Forniture Srl",
                "address": "Via Roma 10",
                "zip": "20121",
                "city": "Milano",
                "country": "it"
            })),
        )
        .await;
    assert_eq!(saved.status(), StatusCode::OK);
    let body = response_json(saved).await;
    assert_eq!(body["data"]["country"], "IT");
    let id = body["data"]["id"].as_i64().unwrap();

    let listed = response_json(app.request(Method::GET, "/api/v1/brt/recipients", None).await).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let deleted = app
        .request(Method::DELETE, &format!("/api/v1/brt/recipients/{}", id), None)
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    let missing = app
        .request(Method::DELETE, &format!("/api/v1/brt/recipients/{}", id), None)
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pudo_search_validates_query() {
    let app = TestApp::new().await;

    let found = app
        .request(Method::GET, "/api/v1/brt/pudo?zip=20121&country=it", None)
        .await;
    assert_eq!(found.status(), StatusCode::OK);
    let body = response_json(found).await;
    assert_eq!(body["data"][0]["country"], "IT");

    let invalid = app
        .request(Method::GET, "/api/v1/brt/pudo?zip=20121&country=ITA", None)
        .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn audit_log_and_cleanup() {
    let app = TestApp::new().await;
    app.create(&domestic_form(None)).await;

    let cleanup = app
        .request(Method::POST, "/api/v1/brt/maintenance/cleanup", None)
        .await;
    assert_eq!(cleanup.status(), StatusCode::OK);
    let report = response_json(cleanup).await;
    assert_eq!(report["data"]["removed_files"], 0);

    let logs = response_json(
        app.request(Method::GET, "/api/v1/brt/logs?level=info", None)
            .await,
    )
    .await;
    let total = logs["data"]["total"].as_u64().unwrap();
    assert!(total >= 2);
    assert!(logs["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|entry| entry["level"] == "info"));
}

#[tokio::test]
async fn request_id_header_is_echoed() {
    let app = TestApp::new().await;
    let router = brt_backoffice::app_router(app.state.clone());

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-abc")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-abc");
}
