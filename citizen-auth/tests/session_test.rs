mod common;

use axum::http::{Method, StatusCode};
use common::{fresh_ip, TestApp, PASSWORD, TENANT};
use serde_json::json;

#[tokio::test]
async fn test_login_after_activation() {
    let app = TestApp::spawn();
    app.activated_anna().await;

    let res = app
        .citizen_post(
            "/api/auth/login",
            json!({ "email": "Anna@Example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    assert_eq!(res.body["user"]["displayName"], "Anna M.");
    assert_eq!(res.body["expiresIn"], 900);
    assert!(res.body["refreshToken"].as_str().is_some());
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::spawn();
    app.activated_anna().await;

    let wrong_password = app
        .citizen_post(
            "/api/auth/login",
            json!({ "email": "anna@example.com", "password": "falsches-passwort" }),
        )
        .await;
    let unknown_user = app
        .citizen_post(
            "/api/auth/login",
            json!({ "email": "nobody@example.com", "password": PASSWORD }),
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_user.body);
}

#[tokio::test]
async fn test_login_throttles_after_five_failures() {
    let app = TestApp::spawn();
    app.activated_anna().await;
    let ip = fresh_ip();

    for _ in 0..5 {
        let res = app
            .citizen_post_from(
                &ip,
                "/api/auth/login",
                json!({ "email": "anna@example.com", "password": "falsches-passwort" }),
            )
            .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    let res = app
        .citizen_post_from(
            &ip,
            "/api/auth/login",
            json!({ "email": "anna@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers.contains_key("retry-after"));
}

#[tokio::test]
async fn test_successful_logins_do_not_count() {
    let app = TestApp::spawn();
    app.activated_anna().await;
    let ip = fresh_ip();

    for _ in 0..7 {
        let res = app
            .citizen_post_from(
                &ip,
                "/api/auth/login",
                json!({ "email": "anna@example.com", "password": PASSWORD }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_refresh_rotates_token() {
    let app = TestApp::spawn();
    let session = app.activated_anna().await;
    let original = session["refreshToken"].as_str().unwrap().to_string();

    let res = app
        .citizen_post("/api/auth/refresh", json!({ "refreshToken": original }))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    let rotated = res.body["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, original);
    assert!(res.body["accessToken"].as_str().is_some());

    // The presented token is never accepted again
    let res = app
        .citizen_post("/api/auth/refresh", json!({ "refreshToken": original }))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .citizen_post("/api/auth/refresh", json!({ "refreshToken": rotated }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rejects_unknown_and_foreign_tokens() {
    let app = TestApp::spawn();
    let session = app.activated_anna().await;

    let res = app
        .citizen_post("/api/auth/refresh", json!({ "refreshToken": "never-issued" }))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            &[
                ("x-tenant", common::OTHER_TENANT),
                ("x-site-key", common::OTHER_SITE_KEY),
            ],
            Some(json!({ "refreshToken": session["refreshToken"] })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_and_never_errors() {
    let app = TestApp::spawn();
    let session = app.activated_anna().await;
    let token = session["refreshToken"].as_str().unwrap().to_string();

    let res = app
        .citizen_post("/api/auth/logout", json!({ "refreshToken": token }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "ok": true }));

    let res = app
        .citizen_post("/api/auth/refresh", json!({ "refreshToken": token }))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // Repeated, unknown and empty logouts all succeed
    for body in [
        json!({ "refreshToken": token }),
        json!({ "refreshToken": "unknown" }),
        json!({ "refreshToken": "" }),
        json!({}),
    ] {
        let res = app.citizen_post("/api/auth/logout", body).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["ok"], true);
    }

    let res = app
        .send(
            Method::POST,
            "/api/auth/logout",
            &[("x-tenant", TENANT), ("x-site-key", common::SITE_KEY)],
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_me_returns_principal() {
    let app = TestApp::spawn();
    let session = app.activated_anna().await;
    let token = session["accessToken"].as_str().unwrap();

    let res = app.get_with_token("/api/auth/me", token).await;
    assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    assert_eq!(res.body["sub"], session["user"]["id"]);
    assert_eq!(res.body["tenantId"], TENANT);
    assert_eq!(res.body["role"], "USER");
    assert_eq!(res.body["email"], "anna@example.com");
    assert!(res.body.get("expiresAt").is_none());
}
