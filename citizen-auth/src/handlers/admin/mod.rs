//! Admin-key protected endpoints.

pub mod activation_codes;
pub mod residents;
pub mod tourist_codes;
pub mod users;

pub use activation_codes::*;
pub use residents::*;
pub use tourist_codes::*;
pub use users::*;
