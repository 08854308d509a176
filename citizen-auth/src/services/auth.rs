use chrono::Utc;
use service_core::middleware::rate_limit::{AttemptLimiter, RateLimitDecision};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::activation::ActivationCodeService;
use super::error::ServiceError;
use super::jwt::JwtService;
use super::metrics;
use super::refresh_tokens::RefreshTokenStore;
use super::residents::ResidentRegistry;
use super::users::UserStore;
use crate::dtos::auth::{ActivateRequest, AuthResponse, LoginRequest, TokenPairResponse};
use crate::models::{normalize_email, ActivationCodeState, AuthUser};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

const TOKEN_TYPE: &str = "Bearer";

/// Verified against when the email is unknown, so a miss costs one bcrypt
/// comparison like a wrong password does.
const DUMMY_PASSWORD: &str = "citizen-auth-unknown-account";

/// Activation, login, refresh and logout for resident accounts.
#[derive(Clone)]
pub struct AuthService {
    residents: ResidentRegistry,
    activation: ActivationCodeService,
    users: UserStore,
    refresh_tokens: RefreshTokenStore,
    jwt: JwtService,
    limiter: Arc<dyn AttemptLimiter>,
    dummy_hash: Arc<OnceCell<String>>,
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

async fn hash_password_blocking(password: String) -> Result<String, ServiceError> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&Password::new(password)))
        .await
        .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))??;
    Ok(hash.into_string())
}

async fn verify_password_blocking(password: String, hash: String) -> bool {
    let outcome = tokio::task::spawn_blocking(move || {
        verify_password(&Password::new(password), &PasswordHashString::new(hash))
    })
    .await;

    matches!(outcome, Ok(Ok(())))
}

impl AuthService {
    pub fn new(
        residents: ResidentRegistry,
        activation: ActivationCodeService,
        users: UserStore,
        refresh_tokens: RefreshTokenStore,
        jwt: JwtService,
        limiter: Arc<dyn AttemptLimiter>,
    ) -> Self {
        Self {
            residents,
            activation,
            users,
            refresh_tokens,
            jwt,
            limiter,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Take one attempt from the budget of `key` before doing any work.
    fn reserve_attempt(&self, key: &str, scope: &'static str) -> Result<(), ServiceError> {
        match self.limiter.check_and_increment(key) {
            RateLimitDecision::Allowed => Ok(()),
            RateLimitDecision::Limited { retry_after } => {
                tracing::warn!(scope, "Attempt limit reached");
                metrics::record_rate_limited(scope);
                Err(ServiceError::too_many_attempts(retry_after))
            }
        }
    }

    /// Redeem an activation code and create the resident's account.
    ///
    /// Every attempt that passes the IP gate counts against the IP,
    /// successful or not. The attempt is taken before the code is looked up.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, ip = %ip))]
    pub async fn activate(
        &self,
        tenant_id: &str,
        request: &ActivateRequest,
        ip: &str,
    ) -> Result<AuthResponse, ServiceError> {
        let key = format!("activate:{}", ip);
        if let Err(e) = self.reserve_attempt(&key, "activate") {
            metrics::record_activation(e.outcome());
            return Err(e);
        }

        let result = self.activate_account(tenant_id, request).await;

        match &result {
            Ok(response) => {
                tracing::info!(user_id = %response.user.id, "Resident activated");
                metrics::record_activation("success");
            }
            Err(e) => {
                tracing::warn!(reason = %e, "Activation failed");
                metrics::record_activation(e.outcome());
            }
        }
        result
    }

    async fn activate_account(
        &self,
        tenant_id: &str,
        request: &ActivateRequest,
    ) -> Result<AuthResponse, ServiceError> {
        let now = Utc::now();

        let code_hash = self
            .activation
            .hash_code(tenant_id, &request.activation_code)?;
        let activation = self
            .activation
            .find_by_hash(tenant_id, &code_hash)
            .await?
            .ok_or(ServiceError::InvalidActivationCode)?;

        let activation = self
            .activation
            .register_attempt(tenant_id, &activation.id, now)
            .await?;

        let resident = match self
            .residents
            .get_by_id(tenant_id, &activation.resident_id)
            .await
        {
            Ok(resident) => resident,
            Err(ServiceError::ResidentNotFound) => {
                tracing::error!(activation_id = %activation.id, "Activation code bound to missing resident");
                return Err(ServiceError::InvalidActivationCode);
            }
            Err(e) => return Err(e),
        };

        // Address before code state
        if !resident.matches_address(&request.postal_code, &request.house_number) {
            return Err(ServiceError::AddressMismatch);
        }

        match activation.state_at(now) {
            ActivationCodeState::Issued => {}
            ActivationCodeState::Revoked => return Err(ServiceError::ActivationCodeRevoked),
            ActivationCodeState::Used => return Err(ServiceError::ActivationCodeUsed),
            ActivationCodeState::Expired => return Err(ServiceError::ActivationCodeExpired),
        }

        if !resident.is_active() {
            return Err(ServiceError::ResidentInactive);
        }

        let email = normalize_email(&request.email);
        if !looks_like_email(&email) {
            return Err(ServiceError::Validation(
                "Ungültige E-Mail-Adresse".to_string(),
            ));
        }
        if self.users.find_by_email(tenant_id, &email).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered);
        }
        if self
            .users
            .find_by_resident(tenant_id, &resident.id)
            .await?
            .is_some()
        {
            return Err(ServiceError::ResidentAlreadyActivated);
        }

        let password_hash = hash_password_blocking(request.password.clone()).await?;
        let user = self
            .users
            .create(AuthUser::new(tenant_id, &resident.id, &email, password_hash))
            .await?;

        if let Err(e) = self
            .activation
            .mark_used(tenant_id, &activation.id, Utc::now())
            .await
        {
            // Lost a race for the code; undo the account
            if let Err(rollback) = self.users.remove(tenant_id, &user.id).await {
                tracing::error!(user_id = %user.id, error = %rollback, "Failed to roll back account");
            }
            return Err(e);
        }

        self.issue_session(&user, resident.display_name()).await
    }

    /// Email and password login. Failures are indistinguishable to the
    /// caller and count against the IP; a success hands its reserved
    /// attempt back.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, ip = %ip))]
    pub async fn login(
        &self,
        tenant_id: &str,
        request: &LoginRequest,
        ip: &str,
    ) -> Result<AuthResponse, ServiceError> {
        let key = format!("login:{}", ip);
        if let Err(e) = self.reserve_attempt(&key, "login") {
            metrics::record_login(e.outcome());
            return Err(e);
        }

        let candidate = match self.users.find_by_email(tenant_id, &request.email).await {
            Ok(candidate) => candidate,
            Err(e) => {
                self.limiter.release(&key);
                return Err(e);
            }
        };
        let verified = match &candidate {
            Some(user) => {
                verify_password_blocking(request.password.clone(), user.password_hash.clone())
                    .await
            }
            None => {
                self.burn_password_check(&request.password).await;
                false
            }
        };

        let user = match candidate {
            Some(user) if verified => user,
            _ => {
                tracing::warn!("Login failed");
                metrics::record_login("invalid_credentials");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        self.limiter.release(&key);

        let display_name = self.display_name_for(&user).await?;
        let response = self.issue_session(&user, display_name).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        metrics::record_login("success");
        Ok(response)
    }

    /// Rotate the refresh token and mint a new access token.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn refresh(
        &self,
        tenant_id: &str,
        refresh_token: &str,
    ) -> Result<TokenPairResponse, ServiceError> {
        let rotated = self
            .refresh_tokens
            .rotate(tenant_id, refresh_token.trim(), Utc::now())
            .await?;

        let user = match self
            .users
            .find_by_id(tenant_id, &rotated.record.user_id)
            .await?
        {
            Some(user) => user,
            None => {
                self.refresh_tokens
                    .revoke(tenant_id, &rotated.plaintext)
                    .await?;
                return Err(ServiceError::InvalidRefreshToken);
            }
        };

        Ok(TokenPairResponse {
            access_token: self.jwt.generate_access_token(&user)?,
            refresh_token: rotated.plaintext,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
        })
    }

    /// Revoke the refresh token if it is live. Unknown or already revoked
    /// tokens are not an error.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn logout(&self, tenant_id: &str, refresh_token: &str) -> Result<(), ServiceError> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Ok(());
        }

        if self.refresh_tokens.revoke(tenant_id, refresh_token).await? {
            tracing::info!("Refresh token revoked");
        }
        Ok(())
    }

    /// Spend the time of a real password check on a fixed hash.
    async fn burn_password_check(&self, password: &str) {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| hash_password_blocking(DUMMY_PASSWORD.to_string()))
            .await;
        match hash {
            Ok(hash) => {
                verify_password_blocking(password.to_string(), hash.clone()).await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to prepare dummy password hash"),
        }
    }

    async fn display_name_for(&self, user: &AuthUser) -> Result<String, ServiceError> {
        match self
            .residents
            .get_by_id(&user.tenant_id, &user.resident_id)
            .await
        {
            Ok(resident) => Ok(resident.display_name()),
            Err(ServiceError::ResidentNotFound) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    async fn issue_session(
        &self,
        user: &AuthUser,
        display_name: String,
    ) -> Result<AuthResponse, ServiceError> {
        let access_token = self.jwt.generate_access_token(user)?;
        let (refresh_token, _) = self.refresh_tokens.issue(&user.tenant_id, &user.id).await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
            user: user.summary(display_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::models::{NewResident, ResidentPatch, ResidentStatus};
    use chrono::Duration;
    use service_core::middleware::rate_limit::FixedWindowLimiter;
    use service_core::storage::{MemoryStore, RecordStore};

    struct Fixture {
        auth: AuthService,
        residents: ResidentRegistry,
        activation: ActivationCodeService,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let residents = ResidentRegistry::new(store.clone());
        let activation = ActivationCodeService::new(
            store.clone(),
            "test-activation-secret",
            5,
            Duration::minutes(15),
        );
        let jwt = JwtService::new(&JwtConfig {
            secret: "test-jwt-secret".to_string(),
            issuer: "citizen-auth".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 30,
        })
        .unwrap();
        let limiter: Arc<dyn AttemptLimiter> =
            Arc::new(FixedWindowLimiter::new(5, std::time::Duration::from_secs(900)));

        let auth = AuthService::new(
            residents.clone(),
            activation.clone(),
            UserStore::new(store.clone()),
            RefreshTokenStore::new(store, 30),
            jwt,
            limiter,
        );

        Fixture {
            auth,
            residents,
            activation,
        }
    }

    async fn anna_with_code(fixture: &Fixture) -> (String, String) {
        let anna = fixture
            .residents
            .create(
                "fulda",
                NewResident {
                    first_name: "Anna".to_string(),
                    last_name: "Muster".to_string(),
                    postal_code: "36115".to_string(),
                    house_number: "12A".to_string(),
                },
            )
            .await
            .unwrap();
        let issued = fixture
            .activation
            .create_code("fulda", &anna.id, Utc::now() + Duration::days(30))
            .await
            .unwrap();
        (anna.id, issued.code)
    }

    fn activate_request(code: &str, email: &str, postal: &str, house: &str) -> ActivateRequest {
        ActivateRequest {
            activation_code: code.to_string(),
            email: email.to_string(),
            password: "sicheres-passwort".to_string(),
            postal_code: postal.to_string(),
            house_number: house.to_string(),
        }
    }

    #[tokio::test]
    async fn test_activate_then_reactivate() {
        let fixture = fixture();
        let (_, code) = anna_with_code(&fixture).await;

        let response = fixture
            .auth
            .activate("fulda", &activate_request(&code, "a@example.com", "36115", "12A"), "10.0.0.1")
            .await
            .unwrap();
        assert_eq!(response.user.display_name, "Anna M.");
        assert_eq!(response.user.email, "a@example.com");

        let err = fixture
            .auth
            .activate("fulda", &activate_request(&code, "b@example.com", "36115", "12A"), "10.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ActivationCodeUsed));
    }

    #[tokio::test]
    async fn test_unknown_code_is_unauthorized() {
        let fixture = fixture();
        anna_with_code(&fixture).await;

        let err = fixture
            .auth
            .activate("fulda", &activate_request("ZZZZ-ZZZZ", "a@example.com", "36115", "12A"), "10.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidActivationCode));
    }

    #[tokio::test]
    async fn test_address_checked_before_code_state() {
        let fixture = fixture();
        let (resident_id, first) = anna_with_code(&fixture).await;
        // Reissue revokes the first code
        fixture
            .activation
            .create_code("fulda", &resident_id, Utc::now() + Duration::days(30))
            .await
            .unwrap();

        let err = fixture
            .auth
            .activate("fulda", &activate_request(&first, "a@example.com", "99999", "1"), "10.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AddressMismatch));

        let err = fixture
            .auth
            .activate("fulda", &activate_request(&first, "a@example.com", "36115", "12a"), "10.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ActivationCodeRevoked));
    }

    #[tokio::test]
    async fn test_inactive_resident_cannot_activate() {
        let fixture = fixture();
        let (resident_id, code) = anna_with_code(&fixture).await;
        fixture
            .residents
            .update(
                "fulda",
                &resident_id,
                ResidentPatch {
                    status: Some(ResidentStatus::Inactive),
                    ..ResidentPatch::default()
                },
            )
            .await
            .unwrap();

        let err = fixture
            .auth
            .activate("fulda", &activate_request(&code, "a@example.com", "36115", "12A"), "10.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ResidentInactive));
    }

    #[tokio::test]
    async fn test_sixth_attempt_from_same_ip_is_throttled() {
        let fixture = fixture();
        anna_with_code(&fixture).await;
        let request = activate_request("0000-0000", "a@example.com", "36115", "12A");

        for _ in 0..5 {
            assert!(matches!(
                fixture.auth.activate("fulda", &request, "10.0.0.9").await,
                Err(ServiceError::InvalidActivationCode)
            ));
        }
        assert!(matches!(
            fixture.auth.activate("fulda", &request, "10.0.0.9").await,
            Err(ServiceError::TooManyAttempts { .. })
        ));
        // Other IPs are unaffected
        assert!(matches!(
            fixture.auth.activate("fulda", &request, "10.0.0.10").await,
            Err(ServiceError::InvalidActivationCode)
        ));
    }

    #[tokio::test]
    async fn test_expired_code_is_forbidden() {
        let fixture = fixture();
        let anna = fixture
            .residents
            .create(
                "fulda",
                NewResident {
                    first_name: "Anna".to_string(),
                    last_name: "Muster".to_string(),
                    postal_code: "36115".to_string(),
                    house_number: "12A".to_string(),
                },
            )
            .await
            .unwrap();
        let issued = fixture
            .activation
            .create_code("fulda", &anna.id, Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        let err = fixture
            .auth
            .activate("fulda", &activate_request(&issued.code, "a@example.com", "36115", "12A"), "10.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ActivationCodeExpired));
        assert_eq!(
            service_core::error::AppError::from(err).status_code(),
            axum::http::StatusCode::FORBIDDEN
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_attempts_from_one_ip_are_capped() {
        let fixture = fixture();
        anna_with_code(&fixture).await;

        let handles: Vec<_> = (0..30)
            .map(|_| {
                let auth = fixture.auth.clone();
                tokio::spawn(async move {
                    let request = activate_request("0000-0000", "a@example.com", "36115", "12A");
                    auth.activate("fulda", &request, "10.0.0.9").await
                })
            })
            .collect();

        let mut evaluated = 0;
        let mut limited = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Err(ServiceError::InvalidActivationCode) => evaluated += 1,
                Err(ServiceError::TooManyAttempts { .. }) => limited += 1,
                other => panic!("unexpected outcome {:?}", other.map(|_| ())),
            }
        }
        assert_eq!(evaluated, 5);
        assert_eq!(limited, 25);
    }

    #[tokio::test]
    async fn test_only_failed_logins_use_the_budget() {
        let fixture = fixture();
        let (_, code) = anna_with_code(&fixture).await;
        fixture
            .auth
            .activate("fulda", &activate_request(&code, "a@example.com", "36115", "12A"), "10.0.0.1")
            .await
            .unwrap();

        let good = LoginRequest {
            email: "a@example.com".to_string(),
            password: "sicheres-passwort".to_string(),
        };
        for _ in 0..6 {
            fixture.auth.login("fulda", &good, "10.0.0.5").await.unwrap();
        }

        let unknown = LoginRequest {
            email: "nobody@example.com".to_string(),
            password: "sicheres-passwort".to_string(),
        };
        for _ in 0..5 {
            assert!(matches!(
                fixture.auth.login("fulda", &unknown, "10.0.0.5").await,
                Err(ServiceError::InvalidCredentials)
            ));
        }
        assert!(matches!(
            fixture.auth.login("fulda", &good, "10.0.0.5").await,
            Err(ServiceError::TooManyAttempts { .. })
        ));
    }

    #[tokio::test]
    async fn test_login_refresh_logout() {
        let fixture = fixture();
        let (_, code) = anna_with_code(&fixture).await;
        fixture
            .auth
            .activate("fulda", &activate_request(&code, "A@Example.com", "36115", "12A"), "10.0.0.1")
            .await
            .unwrap();

        let wrong = LoginRequest {
            email: "a@example.com".to_string(),
            password: "falsches-passwort".to_string(),
        };
        assert!(matches!(
            fixture.auth.login("fulda", &wrong, "10.0.0.1").await,
            Err(ServiceError::InvalidCredentials)
        ));

        let login = LoginRequest {
            email: " a@example.com ".to_string(),
            password: "sicheres-passwort".to_string(),
        };
        let session = fixture.auth.login("fulda", &login, "10.0.0.1").await.unwrap();
        assert_eq!(session.user.display_name, "Anna M.");

        let rotated = fixture
            .auth
            .refresh("fulda", &session.refresh_token)
            .await
            .unwrap();
        assert!(matches!(
            fixture.auth.refresh("fulda", &session.refresh_token).await,
            Err(ServiceError::InvalidRefreshToken)
        ));

        fixture
            .auth
            .logout("fulda", &rotated.refresh_token)
            .await
            .unwrap();
        fixture
            .auth
            .logout("fulda", &rotated.refresh_token)
            .await
            .unwrap();
        assert!(fixture
            .auth
            .refresh("fulda", &rotated.refresh_token)
            .await
            .is_err());
    }

    #[test]
    fn test_email_shape() {
        assert!(looks_like_email("a@example.com"));
        assert!(!looks_like_email("a@example"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("a b@example.com"));
        assert!(!looks_like_email("example.com"));
    }
}
