use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::leasing::domain::PaymentMethod;
use crate::workflows::leasing::memory::MemoryLeasingStore;
use crate::workflows::leasing::router::{self, leasing_router, AsOf, USER_HEADER};

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

fn headers_for(user: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_HEADER, HeaderValue::from_str(user).expect("valid header"));
    headers
}

#[tokio::test]
async fn create_property_route_requires_a_user() {
    let (service, _, _) = build_service();
    let router = leasing_router(Arc::new(service));
    let body = serde_json::to_value(listing()).expect("listing serializes");

    let anonymous = router
        .clone()
        .oneshot(request("POST", "/api/v1/properties", None, Some(body.clone())))
        .await
        .expect("route executes");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/properties",
            Some(landlord().as_str()),
            Some(body),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("available"));
    assert_eq!(payload["landlordId"], json!(landlord().as_str()));
    assert_eq!(payload["location"]["postalCode"], json!("62701"));
}

#[tokio::test]
async fn lease_flow_over_http() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let router = leasing_router(service.clone());
    let (_, lease) = pending_lease(&service);
    let lease_uri = format!("/api/v1/leases/{}", lease.id);

    let signed = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("{lease_uri}/sign"),
            Some(tenant().as_str()),
            Some(json!({ "name": "Bo Tenant" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(signed.status(), StatusCode::OK);
    assert_eq!(read_json_body(signed).await["tenantSigned"], json!(true));

    let paid = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("{lease_uri}/payments"),
            Some(tenant().as_str()),
            Some(json!({
                "months": 1,
                "amount": 150_000,
                "currency": "USD",
                "method": "bank_transfer",
            })),
        ))
        .await
        .expect("route executes");
    assert_eq!(paid.status(), StatusCode::ACCEPTED);
    let transaction = read_json_body(paid).await;
    assert_eq!(transaction["type"], json!("Lease Activation"));
    assert_eq!(transaction["status"], json!("Pending Verification"));

    let again = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("{lease_uri}/payments"),
            Some(tenant().as_str()),
            Some(json!({
                "months": 1,
                "amount": 150_000,
                "currency": "USD",
                "method": "card",
            })),
        ))
        .await
        .expect("route executes");
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let transaction_id = transaction["id"].as_str().expect("transaction id");
    let confirmed = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/transactions/{transaction_id}/confirm"),
            None,
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(confirmed.status(), StatusCode::OK);
    let outcome = read_json_body(confirmed).await;
    assert_eq!(outcome["activated"], json!(true));
    assert_eq!(outcome["lease"]["status"], json!("active"));

    let rent = router
        .clone()
        .oneshot(request(
            "GET",
            &format!("{lease_uri}/rent"),
            Some(tenant().as_str()),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(rent.status(), StatusCode::OK);
    let rent = read_json_body(rent).await;
    assert_eq!(rent["totalMonthsPaid"], json!(1));
    assert_eq!(rent["hasPendingPayments"], json!(false));

    let outsider = router
        .oneshot(request("GET", &lease_uri, Some("stranger"), None))
        .await
        .expect("route executes");
    assert_eq!(outsider.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_lease_is_not_found() {
    let (service, _, _) = build_service();
    let router = leasing_router(Arc::new(service));

    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/leases/lease-404/termination",
            Some(tenant().as_str()),
            Some(json!({})),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("lease-404"));
}

#[tokio::test]
async fn invalid_payment_is_unprocessable() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let (_, lease) = pending_lease(&service);
    let mut request_body = payment(2, PaymentMethod::Card);
    request_body.amount = 1;

    let response = router::payment_handler::<MemoryLeasingStore, RecordingNotifier>(
        State(service),
        Path(lease.id.to_string()),
        headers_for(tenant().as_str()),
        axum::Json(request_body),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn lease_handler_reports_standing_as_of_an_instant() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    let (_, lease, _) = active_lease(&service, 1, at(2024, 1, 1));

    let response = router::lease_handler::<MemoryLeasingStore, RecordingNotifier>(
        State(service),
        Path(lease.id.to_string()),
        Query(AsOf {
            as_of: Some(at(2024, 2, 2)),
        }),
        headers_for(landlord().as_str()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["rent"]["isRentDue"], json!(true));
    assert_eq!(payload["rent"]["canPayRent"], json!(true));
    assert_eq!(payload["standing"]["isLeaseExpired"], json!(false));
}

#[tokio::test]
async fn store_outage_maps_to_service_unavailable() {
    let (service, store, _) = build_service();
    let service = Arc::new(service);
    let property = service
        .create_property(&landlord(), listing())
        .expect("listing is valid");
    store.set_offline(true);

    let response = router::property_handler::<MemoryLeasingStore, RecordingNotifier>(
        State(service),
        Path(property.id.to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn tenants_only_list_their_own_leases() {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    pending_lease(&service);
    let router = leasing_router(service);
    let uri = format!("/api/v1/tenants/{}/leases", tenant());

    let own = router
        .clone()
        .oneshot(request("GET", &uri, Some(tenant().as_str()), None))
        .await
        .expect("route executes");
    assert_eq!(own.status(), StatusCode::OK);
    let payload = read_json_body(own).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));

    let other = router
        .oneshot(request("GET", &uri, Some(landlord().as_str()), None))
        .await
        .expect("route executes");
    assert_eq!(other.status(), StatusCode::FORBIDDEN);
}
