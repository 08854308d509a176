pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::headers::{ADMIN_KEY_HEADER, SITE_KEY_HEADER, TENANT_HEADER};
use service_core::middleware::rate_limit::{
    create_ip_rate_limiter, ip_rate_limit_middleware, AttemptLimiter, FixedWindowLimiter,
    IpRateLimiter,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{make_request_span, request_id_middleware, REQUEST_ID_HEADER},
};
use service_core::storage::RecordStore;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{PortalConfig, SwaggerMode};
use crate::middleware::KeyRing;
use crate::services::{
    ActivationCodeService, AuthService, JwtService, RefreshTokenStore, ResidentRegistry,
    TouristCodeService, UserStore,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::auth::activate,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::tourist::redeem,
        handlers::staff::list_residents,
        handlers::admin::residents::create_resident,
        handlers::admin::residents::list_residents,
        handlers::admin::residents::get_resident,
        handlers::admin::residents::update_resident,
        handlers::admin::residents::import_residents,
        handlers::admin::residents::activation_code_status,
        handlers::admin::activation_codes::create_activation_code,
        handlers::admin::tourist_codes::generate_tourist_codes,
        handlers::admin::tourist_codes::list_tourist_codes,
        handlers::admin::tourist_codes::revoke_tourist_code,
        handlers::admin::users::set_user_role,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::ActivateRequest,
            dtos::auth::LoginRequest,
            dtos::auth::RefreshRequest,
            dtos::auth::LogoutRequest,
            dtos::auth::AuthResponse,
            dtos::auth::TokenPairResponse,
            dtos::auth::OkResponse,
            dtos::auth::MeResponse,
            dtos::tourist::RedeemRequest,
            dtos::tourist::TouristPrincipal,
            dtos::tourist::TouristSessionResponse,
            dtos::tourist::TouristCodeView,
            dtos::admin::CreateResidentRequest,
            dtos::admin::CreateResidentResponse,
            dtos::admin::UpdateResidentRequest,
            dtos::admin::ImportResidentsRequest,
            dtos::admin::CreateActivationCodeRequest,
            dtos::admin::ActivationCodeResponse,
            dtos::admin::ActivationCodeStatusResponse,
            dtos::admin::GenerateTouristCodesRequest,
            dtos::admin::GenerateTouristCodesResponse,
            dtos::admin::SetRoleRequest,
            dtos::admin::SetRoleResponse,
            services::BulkUpsertReport,
            services::residents::BulkRowError,
            models::Resident,
            models::ResidentStatus,
            models::Role,
            models::UserSummary,
            models::TouristCodeStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Resident activation, login and sessions"),
        (name = "Tourist", description = "Tourist access codes"),
        (name = "Staff", description = "Municipal staff operations"),
        (name = "Admin", description = "Tenant administration"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "admin_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(ADMIN_KEY_HEADER))),
            );
            components.add_security_scheme(
                "site_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(SITE_KEY_HEADER))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: PortalConfig,
    pub jwt: JwtService,
    pub residents: ResidentRegistry,
    pub activation: ActivationCodeService,
    pub users: UserStore,
    pub refresh_tokens: RefreshTokenStore,
    pub auth_service: AuthService,
    pub tourist_service: TouristCodeService,
    pub admin_keys: KeyRing,
    pub site_keys: KeyRing,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire every service over one record store.
    pub fn new(config: PortalConfig, store: Arc<dyn RecordStore>) -> Result<Self, AppError> {
        let jwt = JwtService::new(&config.jwt).map_err(AppError::ConfigError)?;

        let limits = &config.rate_limit;
        let attempt_limiter: Arc<dyn AttemptLimiter> = Arc::new(FixedWindowLimiter::new(
            limits.auth_attempts,
            Duration::from_secs(limits.auth_window_seconds),
        ));
        let code_window =
            chrono::Duration::seconds(limits.code_window_seconds.min(u64::from(u32::MAX)) as i64);

        let residents = ResidentRegistry::new(store.clone());
        let activation = ActivationCodeService::new(
            store.clone(),
            &config.activation.code_secret,
            limits.code_attempts,
            code_window,
        );
        let users = UserStore::new(store.clone());
        let refresh_tokens =
            RefreshTokenStore::new(store.clone(), config.jwt.refresh_token_expiry_days);

        let auth_service = AuthService::new(
            residents.clone(),
            activation.clone(),
            users.clone(),
            refresh_tokens.clone(),
            jwt.clone(),
            attempt_limiter.clone(),
        );
        let tourist_service = TouristCodeService::new(store, jwt.clone(), attempt_limiter);

        let ip_rate_limiter =
            create_ip_rate_limiter(limits.global_ip_limit, limits.global_ip_window_seconds);

        Ok(Self {
            admin_keys: KeyRing::new(&config.security.admin_keys),
            site_keys: KeyRing::new(&config.security.site_keys),
            config,
            jwt,
            residents,
            activation,
            users,
            refresh_tokens,
            auth_service,
            tourist_service,
            ip_rate_limiter,
        })
    }
}

fn cors_layer(config: &PortalConfig) -> CorsLayer {
    let allowed = &config.security.allowed_origins;
    let origins = if allowed.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed.iter().filter_map(|origin| {
            match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            }
        }))
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(TENANT_HEADER),
            HeaderName::from_static(ADMIN_KEY_HEADER),
            HeaderName::from_static(SITE_KEY_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/api/admin/residents",
            post(handlers::admin::create_resident).get(handlers::admin::list_residents),
        )
        .route(
            "/api/admin/residents/import",
            post(handlers::admin::import_residents),
        )
        .route(
            "/api/admin/residents/:resident_id",
            get(handlers::admin::get_resident).patch(handlers::admin::update_resident),
        )
        .route(
            "/api/admin/residents/:resident_id/activation-code",
            get(handlers::admin::activation_code_status),
        )
        .route(
            "/api/admin/activation-codes",
            post(handlers::admin::create_activation_code),
        )
        .route(
            "/api/admin/tourist-codes",
            get(handlers::admin::list_tourist_codes),
        )
        .route(
            "/api/admin/tourist-codes/generate",
            post(handlers::admin::generate_tourist_codes),
        )
        .route(
            "/api/admin/tourist-codes/:code_id/revoke",
            post(handlers::admin::revoke_tourist_code),
        )
        .route("/api/admin/users/role", post(handlers::admin::set_user_role))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    let citizen_routes = Router::new()
        .route("/api/auth/activate", post(handlers::auth::activate))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/tourist/redeem", post(handlers::tourist::redeem))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::site_key_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    let swagger_enabled = state.config.swagger.enabled == SwaggerMode::Public;
    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let ip_limiter = state.ip_rate_limiter.clone();
    let cors = cors_layer(&state.config);

    app.route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/staff/residents",
            get(handlers::staff::list_residents),
        )
        .merge(citizen_routes)
        .merge(admin_routes)
        .with_state(state)
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<axum::body::Body>))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}
