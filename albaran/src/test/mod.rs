//! End-to-end tests driving the full router over the in-memory store.

mod delivery_notes;
mod registries;

use crate::test_utils::TestApp;

#[test_log::test(tokio::test)]
async fn test_healthz_and_openapi() {
    let app = TestApp::new();

    let response = app.server.get("/healthz").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");

    let response = app.server.get("/api-docs/openapi.json").await;
    response.assert_status_ok();
    let content = response.text();
    assert!(content.contains("\"openapi\""));
    assert!(content.contains("/deliverynote/sign/{id}"));
}

#[test_log::test(tokio::test)]
async fn test_protected_routes_require_a_token() {
    let app = TestApp::new();

    for path in ["/user", "/client", "/project", "/deliverynote"] {
        let response = app.server.get(path).expect_failure().await;
        assert_eq!(response.status_code(), 401, "{path} should require a token");
        let body: serde_json::Value = response.json();
        assert!(body["error"].is_string());
    }

    let response = app
        .server
        .get("/client")
        .authorization_bearer("not-a-jwt")
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 401);
}
