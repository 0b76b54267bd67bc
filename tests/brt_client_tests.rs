use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use brt_backoffice::carrier::{
    BrtClient, CarrierError, CreateData, OrmApi, PudoApi, PudoQuery, ShipmentApi, ShipmentKey,
    TrackingApi,
};
use brt_backoffice::config::BrtConfig;

fn client(server: &MockServer) -> BrtClient {
    let config = BrtConfig {
        api_base_url: format!("{}/brt", server.uri()),
        user_id: "1020304".into(),
        password: "secret".into(),
        sender_customer_code: "1020304".into(),
        timeout_secs: 5,
        pudo_token: Some("pudo-token".into()),
        ..Default::default()
    };
    BrtClient::from_config(&config).expect("client builds")
}

fn create_data() -> CreateData {
    CreateData {
        sender_customer_code: "1020304".into(),
        numeric_sender_reference: Some(12),
        number_of_parcels: Some(1),
        weight_kg: Some(1.5),
        consignee_company_name: "Rossi".into(),
        consignee_address: "Via Roma 10".into(),
        consignee_zip_code: "20121".into(),
        consignee_city: "Milano".into(),
        consignee_country: "IT".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn create_sends_account_and_decodes_single_label() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/brt/rest/v1/shipments/shipment"))
        .and(body_partial_json(json!({
            "account": { "userID": "1020304", "password": "secret" },
            "createData": { "numericSenderReference": 12, "consigneeZIPCode": "20121" },
            "isLabelRequired": "1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "createResponse": {
                "executionMessage": { "code": 0, "severity": "INFO", "codeDesc": "OK" },
                "arrivalDepot": "201",
                "numericSenderReference": "12",
                "weightKG": "1,5",
                "labels": { "label": { "parcelID": "050123", "stream": "JVBERi0=" } }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .create_shipment(&create_data())
        .await
        .expect("created");

    assert_eq!(response.numeric_sender_reference, Some(12));
    assert_eq!(response.weight_kg, Some(1.5));
    assert_eq!(response.arrival_depot.as_deref(), Some("201"));
    let label = response.first_label().expect("one label");
    assert_eq!(label.parcel_id.as_deref(), Some("050123"));
    assert_eq!(label.stream.as_deref(), Some("JVBERi0="));
}

#[tokio::test]
async fn negative_execution_code_becomes_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/brt/rest/v1/shipments/shipment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "createResponse": {
                "executionMessage": {
                    "code": -63,
                    "severity": "ERROR",
                    "message": "Numeric sender reference already used"
                }
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_shipment(&create_data())
        .await
        .expect_err("rejected");

    assert!(err.is_reference_already_used());
    assert_matches!(err, CarrierError::Rejected { code: Some(-63), .. });
}

#[tokio::test]
async fn http_status_decides_rejection_or_transport() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/brt/rest/v1/shipments/delete"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Shipment not found"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/brt/rest/v1/shipments/shipment"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let key = ShipmentKey {
        sender_customer_code: "1020304".into(),
        numeric_sender_reference: 12,
        alphanumeric_sender_reference: None,
    };
    let brt = client(&server);

    let deleted = brt.delete_shipment(&key).await.expect_err("404");
    assert!(deleted.is_rejection());
    assert_eq!(deleted.message(), "Shipment not found");

    let confirmed = brt.confirm_shipment(&key).await.expect_err("503");
    assert_matches!(confirmed, CarrierError::Transport(_));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/brt/rest/v1/shipments/routing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .routing_quote(&create_data())
        .await
        .expect_err("not json");
    assert_matches!(err, CarrierError::Decode(_));
}

#[tokio::test]
async fn tracking_unwraps_event_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/brt/rest/v1/tracking/parcelID/050123"))
        .and(header("userID", "1020304"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ttParcelIdResponse": {
                "executionMessage": { "code": 0 },
                "lista_eventi": [
                    { "evento": { "data": "18.10.2026", "descrizione": "CONSEGNATA" } },
                    { "evento": { "data": "17.10.2026", "descrizione": "PARTITA" } }
                ]
            }
        })))
        .mount(&server)
        .await;

    let tracking = client(&server)
        .tracking_by_parcel_id("050123")
        .await
        .expect("tracked");

    assert_eq!(tracking.events.len(), 2);
    assert_eq!(
        tracking.events.first().and_then(|e| e.descrizione.as_deref()),
        Some("CONSEGNATA")
    );
}

#[tokio::test]
async fn orm_errors_without_reservation_are_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/brt/orm/v1/pickups/R-1"))
        .and(header("password", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "numeroRitiro": "R-1",
            "status": "SCHEDULED"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/brt/orm/v1/pickups/R-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": { "code": "E12", "message": "Pickup already collected" }
        })))
        .mount(&server)
        .await;

    let brt = client(&server);
    let found = brt.get_order("R-1").await.expect("found");
    assert_eq!(found.reservation_number.as_deref(), Some("R-1"));
    assert_eq!(found.status.as_deref(), Some("SCHEDULED"));

    let err = brt.cancel_order("R-2").await.expect_err("refused");
    assert_eq!(err, CarrierError::rejected(None, "E12: Pickup already collected"));
}

#[tokio::test]
async fn pudo_search_sends_token_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/brt/rest/v1/pudo/search"))
        .and(header("X-API-Auth", "pudo-token"))
        .and(query_param("zipCode", "20121"))
        .and(query_param("countryCode", "IT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pudo": [
                { "pudoId": "P1", "pointName": "Edicola", "zipCode": 20121, "latitude": "45,46" }
            ]
        })))
        .mount(&server)
        .await;

    let points = client(&server)
        .search(&PudoQuery {
            country_code: "IT".into(),
            zip_code: "20121".into(),
            city: None,
            address: None,
            max_results: 5,
        })
        .await
        .expect("points");

    assert_eq!(points.len(), 1);
    assert_eq!(points[0].id.as_deref(), Some("P1"));
    assert_eq!(points[0].zip.as_deref(), Some("20121"));
    assert_eq!(points[0].latitude, Some(45.46));
}
