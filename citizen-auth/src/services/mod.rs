//! Business logic: registries, code issuers, token stores and the auth
//! orchestrator. Everything is tenant-scoped and persisted through
//! `service_core::storage`.

pub mod activation;
pub mod auth;
pub mod error;
mod jwt;
pub mod metrics;
pub mod refresh_tokens;
pub mod residents;
pub mod tourist;
pub mod users;

pub use activation::{ActivationCodeService, IssuedActivationCode};
pub use auth::AuthService;
pub use error::ServiceError;
pub use jwt::{AccessTokenClaims, JwtService};
pub use refresh_tokens::RefreshTokenStore;
pub use residents::{BulkUpsertReport, ResidentRegistry, UpsertOutcome};
pub use tourist::{TouristCodeFilter, TouristCodeService};
pub use users::{UserSelector, UserStore};
