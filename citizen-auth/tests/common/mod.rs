//! Shared setup for citizen-auth integration tests.
//!
//! Every `TestApp` owns a fresh temporary data directory, so tests never
//! share records or throttling state.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use citizen_auth::{
    build_router,
    config::{
        ActivationConfig, Environment, JwtConfig, PortalConfig, RateLimitConfig, SecurityConfig,
        StorageConfig, SwaggerConfig, SwaggerMode,
    },
    AppState,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use service_core::storage::JsonFileStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const TENANT: &str = "fulda";
pub const OTHER_TENANT: &str = "kassel";
pub const ADMIN_KEY: &str = "admin-key-fulda";
pub const OTHER_ADMIN_KEY: &str = "admin-key-kassel";
pub const SITE_KEY: &str = "site-key-fulda";
pub const OTHER_SITE_KEY: &str = "site-key-kassel";
pub const PASSWORD: &str = "sicheres-passwort";

static NEXT_IP: AtomicU32 = AtomicU32::new(1);

/// A client address nobody else in the test run has used.
pub fn fresh_ip() -> String {
    let n = NEXT_IP.fetch_add(1, Ordering::Relaxed);
    format!("10.{}.{}.{}", (n >> 16) & 0xff, (n >> 8) & 0xff, n & 0xff)
}

pub fn test_config(data_dir: &TempDir) -> PortalConfig {
    PortalConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "citizen-auth".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        storage: StorageConfig {
            data_dir: data_dir.path().to_path_buf(),
            seed_dir: None,
        },
        jwt: JwtConfig {
            secret: "test-jwt-secret-with-at-least-32-bytes!".to_string(),
            issuer: "citizen-auth".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 30,
        },
        activation: ActivationConfig {
            code_secret: "test-activation-secret-32-bytes-long!".to_string(),
            code_expiry_days: 30,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            admin_keys: HashMap::from([
                (ADMIN_KEY.to_string(), TENANT.to_string()),
                (OTHER_ADMIN_KEY.to_string(), OTHER_TENANT.to_string()),
            ]),
            site_keys: HashMap::from([
                (SITE_KEY.to_string(), TENANT.to_string()),
                (OTHER_SITE_KEY.to_string(), OTHER_TENANT.to_string()),
            ]),
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            auth_attempts: 5,
            auth_window_seconds: 900,
            code_attempts: 5,
            code_window_seconds: 900,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
        },
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _data_dir: TempDir,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(|_| {})
    }

    pub fn spawn_with(customize: impl FnOnce(&mut PortalConfig)) -> Self {
        let data_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = test_config(&data_dir);
        customize(&mut config);

        let store = Arc::new(JsonFileStore::new(data_dir.path(), None));
        let state = AppState::new(config, store).expect("Failed to build app state");
        let router = build_router(state.clone());

        Self {
            router,
            state,
            _data_dir: data_dir,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn admin_post(&self, uri: &str, body: Value) -> TestResponse {
        self.send(
            Method::POST,
            uri,
            &[("x-tenant", TENANT), ("x-admin-key", ADMIN_KEY)],
            Some(body),
        )
        .await
    }

    pub async fn admin_get(&self, uri: &str) -> TestResponse {
        self.send(
            Method::GET,
            uri,
            &[("x-tenant", TENANT), ("x-admin-key", ADMIN_KEY)],
            None,
        )
        .await
    }

    /// Citizen endpoint of the default tenant, from the given client IP.
    pub async fn citizen_post_from(&self, ip: &str, uri: &str, body: Value) -> TestResponse {
        self.send(
            Method::POST,
            uri,
            &[
                ("x-tenant", TENANT),
                ("x-site-key", SITE_KEY),
                ("x-forwarded-for", ip),
            ],
            Some(body),
        )
        .await
    }

    pub async fn citizen_post(&self, uri: &str, body: Value) -> TestResponse {
        self.citizen_post_from(&fresh_ip(), uri, body).await
    }

    pub async fn get_with_token(&self, uri: &str, token: &str) -> TestResponse {
        let bearer = format!("Bearer {}", token);
        self.send(
            Method::GET,
            uri,
            &[("x-tenant", TENANT), ("authorization", &bearer)],
            None,
        )
        .await
    }

    /// Register a resident and return its id.
    pub async fn create_resident(
        &self,
        first_name: &str,
        last_name: &str,
        postal_code: &str,
        house_number: &str,
    ) -> String {
        let res = self
            .admin_post(
                "/api/admin/residents",
                json!({
                    "firstName": first_name,
                    "lastName": last_name,
                    "postalCode": postal_code,
                    "houseNumber": house_number,
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["residentId"]
            .as_str()
            .expect("residentId missing")
            .to_string()
    }

    /// Issue an activation code and return its plaintext.
    pub async fn issue_code(&self, resident_id: &str) -> String {
        let res = self
            .admin_post(
                "/api/admin/activation-codes",
                json!({ "residentId": resident_id }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["code"].as_str().expect("code missing").to_string()
    }

    pub async fn activate(
        &self,
        code: &str,
        email: &str,
        postal_code: &str,
        house_number: &str,
    ) -> TestResponse {
        self.citizen_post(
            "/api/auth/activate",
            json!({
                "activationCode": code,
                "email": email,
                "password": PASSWORD,
                "postalCode": postal_code,
                "houseNumber": house_number,
            }),
        )
        .await
    }

    /// Anna Muster at 36115 / 12A, activated as `anna@example.com`.
    /// Returns the activation response body.
    pub async fn activated_anna(&self) -> Value {
        let resident_id = self.create_resident("Anna", "Muster", "36115", "12A").await;
        let code = self.issue_code(&resident_id).await;
        let res = self.activate(&code, "anna@example.com", "36115", "12A").await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body
    }

    pub async fn generate_tourist_codes(&self, duration_days: u32, amount: u32) -> Vec<String> {
        let res = self
            .admin_post(
                "/api/admin/tourist-codes/generate",
                json!({ "durationDays": duration_days, "amount": amount }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        res.body["codes"]
            .as_array()
            .expect("codes missing")
            .iter()
            .map(|c| c.as_str().expect("code is a string").to_string())
            .collect()
    }
}
