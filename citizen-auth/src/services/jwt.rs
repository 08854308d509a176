use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{AuthUser, Role};

/// HS256 access token issuer and verifier.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_token_expiry_minutes: i64,
}

/// Access token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenClaims {
    /// Account id, or the tourist code id for tourist sessions
    pub sub: String,
    pub tenant_id: String,
    /// Empty for tourist sessions
    #[serde(default)]
    pub resident_id: String,
    /// Empty for tourist sessions
    #[serde(default)]
    pub email: String,
    pub role: Role,
    /// End of a tourist session, checked independently of `exp`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        if config.secret.is_empty() {
            return Err(anyhow::anyhow!("JWT secret must not be empty"));
        }

        tracing::info!(issuer = %config.issuer, "JWT service initialized with HS256 secret");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        })
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }

    /// Short-lived token for a resident-backed account.
    pub fn generate_access_token(&self, user: &AuthUser) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = Duration::try_minutes(self.access_token_expiry_minutes)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| anyhow::anyhow!("Access token lifetime out of range"))?;
        let claims = AccessTokenClaims {
            sub: user.id.clone(),
            tenant_id: user.tenant_id.clone(),
            resident_id: user.resident_id.clone(),
            email: user.email.clone(),
            role: user.role,
            expires_at: None,
            iss: self.issuer.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        self.encode_claims(&claims)
    }

    /// Tourist session token. Token expiry and the `expiresAt` claim coincide.
    pub fn generate_tourist_token(
        &self,
        tenant_id: &str,
        code_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String, anyhow::Error> {
        let claims = AccessTokenClaims {
            sub: code_id.to_string(),
            tenant_id: tenant_id.to_string(),
            resident_id: String::new(),
            email: String::new(),
            role: Role::Tourist,
            expires_at: Some(expires_at),
            iss: self.issuer.clone(),
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &AccessTokenClaims) -> Result<String, anyhow::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    /// Verify signature, issuer and expiry.
    pub fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<AccessTokenClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str, issuer: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
            issuer: issuer.to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 30,
        }
    }

    fn user() -> AuthUser {
        AuthUser::new("fulda", "resident-1", "a@example.com", "hash".to_string())
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = JwtService::new(&config("test-secret", "citizen-auth")).unwrap();
        let user = user();

        let token = service.generate_access_token(&user).unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.tenant_id, "fulda");
        assert_eq!(claims.resident_id, "resident-1");
        assert_eq!(claims.role, Role::User);
        assert!(claims.expires_at.is_none());
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_rejects_foreign_secret_and_issuer() {
        let service = JwtService::new(&config("test-secret", "citizen-auth")).unwrap();
        let token = service.generate_access_token(&user()).unwrap();

        let other_secret = JwtService::new(&config("other-secret", "citizen-auth")).unwrap();
        assert!(other_secret.validate_access_token(&token).is_err());

        let other_issuer = JwtService::new(&config("test-secret", "someone-else")).unwrap();
        assert!(other_issuer.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_tourist_token_carries_expiry_claim() {
        let service = JwtService::new(&config("test-secret", "citizen-auth")).unwrap();
        let expires_at = Utc::now() + Duration::days(7);

        let token = service
            .generate_tourist_token("fulda", "code-1", expires_at)
            .unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.role, Role::Tourist);
        assert_eq!(claims.sub, "code-1");
        assert!(claims.email.is_empty());
        assert_eq!(claims.exp, expires_at.timestamp());
        assert_eq!(
            claims.expires_at.map(|t| t.timestamp()),
            Some(expires_at.timestamp())
        );
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = JwtService::new(&config("test-secret", "citizen-auth")).unwrap();
        let token = service
            .generate_tourist_token("fulda", "code-1", Utc::now() - Duration::hours(1))
            .unwrap();
        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(JwtService::new(&config("", "citizen-auth")).is_err());
    }
}
