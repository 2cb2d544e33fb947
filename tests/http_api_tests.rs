//! Request-level behaviour that is decided before any database access

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot
use uuid::Uuid;

use prestamos_server::auth::{generate_access_token, Actor, Role};
use prestamos_server::{router, AppState};

fn build_app() -> Router {
    let config = common::test_config("postgres://unused");
    router(AppState::new(common::lazy_pool(), &config))
}

fn token(role: Role) -> String {
    let actor = Actor {
        user_id: Uuid::new_v4(),
        username: "cajero1".to_string(),
        role,
    };
    generate_access_token(&actor, common::TEST_SECRET, 900).unwrap()
}

fn json_request(method: Method, uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = build_app().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

#[tokio::test]
async fn amortization_preview_returns_schedule() {
    let request = json_request(
        Method::POST,
        "/api/amortization",
        json!({"principal": 12000, "monthly_rate": "0.05", "term_months": 12, "frequency": 1}),
        None,
    );
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["periods"], 12);
    assert_eq!(body["data"]["rows"].as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn amortization_accepts_form_bodies() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/amortization")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "principal=4000&monthly_rate=0.1&term_months=2&frequency=semanal&start_date=2024-01-01",
        ))
        .unwrap();
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["periods"], 8);
    assert_eq!(body["data"]["rows"][0]["due_on"], "2024-01-08");
}

#[tokio::test]
async fn amortization_rejects_non_positive_inputs() {
    let request = json_request(
        Method::POST,
        "/api/amortization",
        json!({"principal": 0, "monthly_rate": "0.05", "term_months": 12}),
        None,
    );
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["errors"]["principal"].is_array());
    assert!(body["errors"].get("monthly_rate").is_none());
}

#[tokio::test]
async fn amortization_rejects_principal_beyond_ledger_range() {
    let request = json_request(
        Method::POST,
        "/api/amortization",
        json!({"principal": "1000000000000000000000000000", "monthly_rate": "1", "term_months": 360}),
        None,
    );
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["errors"]["principal"].is_array());
}

#[tokio::test]
async fn sub_cent_payment_is_a_field_error() {
    let request = json_request(
        Method::POST,
        "/api/payments",
        json!({"client_id": 1, "loan_id": 5, "amount": "0.001", "paid_on": "2024-03-15",
               "payment_method": "efectivo", "payment_type": "parcial"}),
        None,
    );
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_object().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors.contains_key("amount"));
}

#[tokio::test]
async fn oversized_disbursement_is_a_field_error() {
    let request = json_request(
        Method::POST,
        "/api/loans",
        json!({"client_document": "001-1234567-8", "amount": "10000000000000",
               "disbursed_on": "2024-03-01", "payment_method": "efectivo",
               "department": "ayuntamiento"}),
        None,
    );
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_object().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors.contains_key("amount"));
}

#[tokio::test]
async fn client_registration_reports_every_missing_field() {
    let request = json_request(Method::POST, "/api/clients", json!({}), None);
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_object().unwrap();
    assert_eq!(errors.len(), 10);
    assert_eq!(
        errors["first_names"][0],
        "El campo Nombre(s) es requerido"
    );
}

#[tokio::test]
async fn client_search_needs_three_characters() {
    let request = json_request(Method::POST, "/api/clients/search", json!({"query": " ab "}), None);
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["query"].is_array());
}

#[tokio::test]
async fn payment_with_bad_fields_is_rejected_before_lookup() {
    let request = json_request(
        Method::POST,
        "/api/payments",
        json!({"client_id": 1, "loan_id": 5, "amount": "-10", "paid_on": "15/03/2024",
               "payment_method": "efectivo", "payment_type": "parcial"}),
        None,
    );
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_object().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors["amount"][0], "El monto debe ser mayor a 0");
    assert!(errors.contains_key("paid_on"));
}

#[tokio::test]
async fn disbursement_requires_core_fields() {
    let request = json_request(Method::POST, "/api/loans", json!({"amount": 5000}), None);
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["client_document"].is_array());
    assert!(body["errors"].get("amount").is_none());
}

#[tokio::test]
async fn voiding_requires_a_token() {
    let request = json_request(
        Method::POST,
        "/api/receipts/void",
        json!({"receipt_number": "PR-5-0001", "reason": "ERROR_MONTO"}),
        None,
    );
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn voiding_rejects_a_forged_token() {
    let actor = Actor {
        user_id: Uuid::new_v4(),
        username: "intruso".to_string(),
        role: Role::Admin,
    };
    let forged = generate_access_token(&actor, "another-secret", 900).unwrap();
    let request = json_request(
        Method::POST,
        "/api/receipts/void",
        json!({"receipt_number": "PR-5-0001", "reason": "ERROR_MONTO"}),
        Some(&forged),
    );
    let (status, _, _) = send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn voiding_validates_reason() {
    let operator = token(Role::Operator);
    let request = json_request(
        Method::POST,
        "/api/receipts/void",
        json!({"receipt_number": "PR-5-0001", "reason": "CAPRICHO"}),
        Some(&operator),
    );
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["reason"].is_array());
}

#[tokio::test]
async fn bulk_delete_is_admin_only() {
    let operator = token(Role::Operator);
    let request = json_request(
        Method::POST,
        "/api/admin/loans/bulk-delete",
        json!({"loan_ids": [1, 2]}),
        Some(&operator),
    );
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn bulk_delete_needs_ids() {
    let admin = token(Role::Admin);
    let request = json_request(
        Method::POST,
        "/api/admin/loans/bulk-delete",
        json!({"loan_ids": []}),
        Some(&admin),
    );
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let request = Request::builder()
        .uri("/api/does-not-exist")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn wrong_method_is_json_405() {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/payments")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"]["code"], "METHOD_NOT_ALLOWED");
    assert!(headers.contains_key(header::ALLOW));
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/payments")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn non_numeric_loan_id_is_bad_request() {
    let request = Request::builder()
        .uri("/api/loans/abc")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let request = Request::builder()
        .uri("/api/nothing-here")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(request).await;

    assert_eq!(headers["x-request-id"], "abc-123");
}
