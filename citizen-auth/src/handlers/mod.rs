//! HTTP handlers for citizen-auth.

pub mod admin;
pub mod auth;
pub mod health;
pub mod metrics;
pub mod staff;
pub mod tourist;

pub use auth::*;
pub use health::*;
pub use staff::*;
pub use tourist::*;
