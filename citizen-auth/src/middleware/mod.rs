pub mod admin;
pub mod auth;
pub mod client;
pub mod keys;
pub mod roles;
pub mod site_key;
pub mod tenant;

pub use admin::admin_auth_middleware;
pub use auth::{authenticate, Principal};
pub use client::ClientIp;
pub use keys::{KeyRejection, KeyRing};
pub use roles::{ensure_role, Authorized, RoleRequirement, StaffRole};
pub use site_key::site_key_middleware;
pub use tenant::{resolve_tenant, Tenant};
