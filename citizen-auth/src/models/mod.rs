pub mod activation_code;
pub mod refresh_token;
pub mod resident;
pub mod tourist_code;
pub mod user;

pub use activation_code::{ActivationCode, ActivationCodeState, AttemptsExhausted};
pub use refresh_token::RefreshToken;
pub use resident::{NewResident, Resident, ResidentPatch, ResidentStatus};
pub use tourist_code::{DurationDays, InvalidTransition, TouristAccessCode, TouristCodeStatus};
pub use user::{normalize_email, AuthUser, Role, UserSummary};
