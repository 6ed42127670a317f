mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"]["status"], "up");

    let response = app.request(Method::GET, "/health/live", None, None).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn responses_echo_request_id() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/clients", None, None).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(response.status(), 200);
    let doc = response_json(response).await;
    assert_eq!(doc["info"]["title"], "Environovalab API");
    assert!(doc["paths"]["/api/proformas"].is_object());
}

#[tokio::test]
async fn settings_update_requires_admin_and_changes_tax() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::PUT,
            "/api/settings/current",
            Some(json!({ "tax_rate": "0.15" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 403);

    let admin = app.admin_token().await;
    let response = app
        .request(
            Method::PUT,
            "/api/settings/current",
            Some(json!({ "tax_rate": "0.15", "company_name": "Environovalab" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(Method::GET, "/api/settings/current", None, None)
        .await;
    let settings = response_json(response).await;
    assert_eq!(settings["tax_rate"], "0.1500");
}

#[tokio::test]
async fn client_search_needs_two_characters() {
    let app = TestApp::new().await;
    app.seed_client("Hidro Andes").await;
    app.seed_client("Minera Sur").await;

    let response = app
        .request(Method::GET, "/api/clients/search?q=h", None, None)
        .await;
    assert_eq!(response_json(response).await.as_array().map(Vec::len), Some(0));

    let response = app
        .request(Method::GET, "/api/clients/search?q=hidro", None, None)
        .await;
    let hits = response_json(response).await;
    assert_eq!(hits.as_array().map(Vec::len), Some(1));
    assert_eq!(hits[0]["name"], "Hidro Andes");
}
