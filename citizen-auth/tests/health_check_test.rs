mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use citizen_auth::config::SwaggerMode;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::spawn();
    let res = app.send(Method::GET, "/health", &[], None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
    assert_eq!(res.body["service"], "citizen-auth");
    assert_eq!(res.body["checks"]["storage"], "up");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::spawn();

    let res = app
        .send(Method::GET, "/health", &[("x-request-id", "req-42")], None)
        .await;
    assert_eq!(
        res.headers.get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-42")
    );

    let res = app.send(Method::GET, "/health", &[], None).await;
    assert!(res.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_document_lists_endpoints() {
    let app = TestApp::spawn();
    let res = app
        .send(Method::GET, "/.well-known/openapi.json", &[], None)
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let paths = &res.body["paths"];
    for path in [
        "/api/auth/activate",
        "/api/auth/login",
        "/api/auth/refresh",
        "/api/auth/logout",
        "/api/tourist/redeem",
        "/api/admin/residents",
        "/api/admin/activation-codes",
        "/api/admin/tourist-codes/generate",
        "/api/admin/users/role",
    ] {
        assert!(paths.get(path).is_some(), "missing {}", path);
    }
}

#[tokio::test]
async fn test_swagger_ui_only_when_enabled() {
    let app = TestApp::spawn();
    let res = app.send(Method::GET, "/docs/", &[], None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let app = TestApp::spawn_with(|config| config.swagger.enabled = SwaggerMode::Public);
    let res = app.send(Method::GET, "/docs/", &[], None).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_responds() {
    let app = TestApp::spawn();
    let res = app.send(Method::GET, "/metrics", &[], None).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_routes_are_not_found() {
    let app = TestApp::spawn();

    for uri in ["/api/does-not-exist", "/api/admin/unknown", "/api/auth/unknown"] {
        let res = app.send(Method::GET, uri, &[], None).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND, "{}", uri);
    }

    // Guards still cover their own routes
    let res = app.send(Method::GET, "/api/admin/residents", &[], None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
