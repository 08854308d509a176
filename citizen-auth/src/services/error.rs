use service_core::error::AppError;
use service_core::storage::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid activation code")]
    InvalidActivationCode,

    #[error("Activation code revoked")]
    ActivationCodeRevoked,

    #[error("Activation code already used")]
    ActivationCodeUsed,

    #[error("Activation code expired")]
    ActivationCodeExpired,

    #[error("Address does not match")]
    AddressMismatch,

    #[error("Resident inactive")]
    ResidentInactive,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Resident already activated")]
    ResidentAlreadyActivated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Too many attempts")]
    TooManyAttempts { retry_after_secs: Option<u64> },

    #[error("Resident not found")]
    ResidentNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Tourist code not found")]
    TouristCodeNotFound,

    #[error("Tourist code is not active")]
    TouristCodeNotActive,

    #[error("Tourist code already redeemed")]
    TouristCodeRedeemed,

    #[error("Could not generate a unique code")]
    CodeGenerationExhausted,
}

impl ServiceError {
    /// Metric label for a failed operation.
    pub fn outcome(&self) -> &'static str {
        match self {
            ServiceError::Store(_)
            | ServiceError::Internal(_)
            | ServiceError::CodeGenerationExhausted => "error",
            ServiceError::Validation(_) => "invalid_input",
            ServiceError::InvalidActivationCode
            | ServiceError::TouristCodeNotFound => "unknown_code",
            ServiceError::ActivationCodeRevoked => "revoked",
            ServiceError::ActivationCodeUsed
            | ServiceError::TouristCodeNotActive
            | ServiceError::TouristCodeRedeemed => "already_used",
            ServiceError::ActivationCodeExpired => "expired",
            ServiceError::AddressMismatch => "address_mismatch",
            ServiceError::ResidentInactive => "resident_inactive",
            ServiceError::EmailAlreadyRegistered | ServiceError::ResidentAlreadyActivated => {
                "conflict"
            }
            ServiceError::InvalidCredentials | ServiceError::InvalidRefreshToken => {
                "invalid_credentials"
            }
            ServiceError::TooManyAttempts { .. } => "rate_limited",
            ServiceError::ResidentNotFound | ServiceError::UserNotFound => "not_found",
        }
    }

    pub fn too_many_attempts(retry_after: std::time::Duration) -> Self {
        // Round up so clients never retry a second early
        let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
        ServiceError::TooManyAttempts {
            retry_after_secs: Some(secs.max(1)),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Store(e) => AppError::StorageError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::InvalidActivationCode => {
                AppError::Unauthorized(anyhow::anyhow!("Ungültiger Aktivierungscode"))
            }
            ServiceError::ActivationCodeRevoked => {
                AppError::Forbidden(anyhow::anyhow!("Aktivierungscode wurde widerrufen"))
            }
            ServiceError::ActivationCodeUsed => {
                AppError::Forbidden(anyhow::anyhow!("Aktivierungscode wurde bereits verwendet"))
            }
            ServiceError::ActivationCodeExpired => {
                AppError::Forbidden(anyhow::anyhow!("Aktivierungscode ist abgelaufen"))
            }
            ServiceError::AddressMismatch => {
                AppError::Forbidden(anyhow::anyhow!("Adresse stimmt nicht überein"))
            }
            ServiceError::ResidentInactive => {
                AppError::Forbidden(anyhow::anyhow!("Einwohnerkonto ist deaktiviert"))
            }
            ServiceError::EmailAlreadyRegistered => {
                AppError::BadRequest(anyhow::anyhow!("E-Mail-Adresse ist bereits registriert"))
            }
            ServiceError::ResidentAlreadyActivated => {
                AppError::BadRequest(anyhow::anyhow!("Für diesen Einwohner existiert bereits ein Konto"))
            }
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("E-Mail oder Passwort ist falsch"))
            }
            ServiceError::InvalidRefreshToken => {
                AppError::Unauthorized(anyhow::anyhow!("Ungültiges oder abgelaufenes Refresh-Token"))
            }
            ServiceError::TooManyAttempts { retry_after_secs } => AppError::TooManyRequests(
                "Zu viele Versuche. Bitte versuchen Sie es später erneut.".to_string(),
                retry_after_secs,
            ),
            ServiceError::ResidentNotFound => {
                AppError::NotFound(anyhow::anyhow!("Einwohner nicht gefunden"))
            }
            ServiceError::UserNotFound => {
                AppError::NotFound(anyhow::anyhow!("Benutzer nicht gefunden"))
            }
            ServiceError::TouristCodeNotFound => {
                AppError::NotFound(anyhow::anyhow!("Gästecode nicht gefunden"))
            }
            ServiceError::TouristCodeNotActive => {
                AppError::Conflict(anyhow::anyhow!("Gästecode ist nicht mehr gültig"))
            }
            ServiceError::TouristCodeRedeemed => {
                AppError::Conflict(anyhow::anyhow!("Gästecode wurde bereits eingelöst"))
            }
            ServiceError::CodeGenerationExhausted => AppError::InternalError(anyhow::anyhow!(
                "Could not generate a unique code"
            )),
        }
    }
}
