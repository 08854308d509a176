use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::storage::is_valid_tenant_id;
use std::{collections::HashMap, env, path::PathBuf};

/// Minimum secret length accepted in production.
const MIN_PROD_SECRET_LEN: usize = 32;
const MAX_ACCESS_TOKEN_MINUTES: i64 = 24 * 60;
const MAX_TTL_DAYS: i64 = 365;
const MAX_WINDOW_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    pub activation: ActivationConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub seed_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivationConfig {
    pub code_secret: String,
    pub code_expiry_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Admin key -> tenant id
    pub admin_keys: HashMap<String, String>,
    /// Site key -> tenant id. Empty disables the site key check.
    pub site_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub auth_attempts: u32,
    pub auth_window_seconds: u64,
    pub code_attempts: u32,
    pub code_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = PortalConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("citizen-auth"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.trim().is_empty()),
            storage: StorageConfig {
                data_dir: get_env("DATA_DIR", Some("./data"), is_prod)?.into(),
                seed_dir: env::var("SEED_DIR")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from),
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET", Some("dev-only-jwt-secret-change-me"), is_prod)?,
                issuer: get_env("JWT_ISSUER", Some("citizen-auth"), is_prod)?,
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "15",
                    is_prod,
                )?,
                refresh_token_expiry_days: parse_env(
                    "JWT_REFRESH_TOKEN_EXPIRY_DAYS",
                    "30",
                    is_prod,
                )?,
            },
            activation: ActivationConfig {
                code_secret: get_env(
                    "ACTIVATION_CODE_SECRET",
                    Some("dev-only-activation-secret-change-me"),
                    is_prod,
                )?,
                code_expiry_days: parse_env("ACTIVATION_CODE_EXPIRY_DAYS", "30", is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                admin_keys: parse_key_map("ADMIN_KEYS", &get_env("ADMIN_KEYS", Some("{}"), is_prod)?)?,
                site_keys: parse_key_map("SITE_KEYS", &get_env("SITE_KEYS", Some("{}"), is_prod)?)?,
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                auth_attempts: parse_env("RATE_LIMIT_AUTH_ATTEMPTS", "5", is_prod)?,
                auth_window_seconds: parse_env("RATE_LIMIT_AUTH_WINDOW_SECONDS", "900", is_prod)?,
                code_attempts: parse_env("RATE_LIMIT_CODE_ATTEMPTS", "5", is_prod)?,
                code_window_seconds: parse_env("RATE_LIMIT_CODE_WINDOW_SECONDS", "900", is_prod)?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", is_prod)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0"));
        }

        for (name, value, max) in [
            (
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                self.jwt.access_token_expiry_minutes,
                MAX_ACCESS_TOKEN_MINUTES,
            ),
            (
                "JWT_REFRESH_TOKEN_EXPIRY_DAYS",
                self.jwt.refresh_token_expiry_days,
                MAX_TTL_DAYS,
            ),
            (
                "ACTIVATION_CODE_EXPIRY_DAYS",
                self.activation.code_expiry_days,
                MAX_TTL_DAYS,
            ),
        ] {
            if !(1..=max).contains(&value) {
                return Err(config_error(&format!(
                    "{} must be between 1 and {}",
                    name, max
                )));
            }
        }

        let limits = &self.rate_limit;
        for (name, value) in [
            ("RATE_LIMIT_AUTH_WINDOW_SECONDS", limits.auth_window_seconds),
            ("RATE_LIMIT_CODE_WINDOW_SECONDS", limits.code_window_seconds),
            ("RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS", limits.global_ip_window_seconds),
        ] {
            if !(1..=MAX_WINDOW_SECONDS).contains(&value) {
                return Err(config_error(&format!(
                    "{} must be between 1 and {}",
                    name, MAX_WINDOW_SECONDS
                )));
            }
        }

        if self.jwt.secret.is_empty() {
            return Err(config_error("JWT_SECRET must not be empty"));
        }

        if self.activation.code_secret.is_empty() {
            return Err(config_error("ACTIVATION_CODE_SECRET must not be empty"));
        }

        for (name, keys) in [
            ("ADMIN_KEYS", &self.security.admin_keys),
            ("SITE_KEYS", &self.security.site_keys),
        ] {
            if let Some(tenant) = keys.values().find(|tenant| !is_valid_tenant_id(tenant)) {
                return Err(config_error(&format!(
                    "{} maps a key to invalid tenant id {:?}",
                    name, tenant
                )));
            }
            if keys.keys().any(|key| key.trim().is_empty()) {
                return Err(config_error(&format!("{} contains an empty key", name)));
            }
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(config_error("Wildcard CORS origin not allowed in production"));
            }

            if self.jwt.secret.len() < MIN_PROD_SECRET_LEN {
                return Err(config_error("JWT_SECRET must be at least 32 bytes in production"));
            }

            if self.activation.code_secret.len() < MIN_PROD_SECRET_LEN {
                return Err(config_error(
                    "ACTIVATION_CODE_SECRET must be at least 32 bytes in production",
                ));
            }

            if self.security.site_keys.is_empty() {
                tracing::warn!("SITE_KEYS is empty - citizen endpoints accept requests without a site key");
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger is publicly accessible in production");
            }
        }

        Ok(())
    }
}

fn config_error(message: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message.to_string()))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

/// Parse a `{"key": "tenant-id"}` JSON object.
fn parse_key_map(key: &str, raw: &str) -> Result<HashMap<String, String>, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{} is not a JSON object of strings: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" | "true" => Ok(SwaggerMode::Public),
            "disabled" | "false" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
