//! Header access shared by every guard.
//!
//! Header names are matched case-insensitively by `HeaderMap`; values are
//! trimmed and blank values count as absent.

use axum::http::HeaderMap;

pub const TENANT_HEADER: &str = "x-tenant";
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";
pub const SITE_KEY_HEADER: &str = "x-site-key";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

pub trait HeaderReader {
    /// Trimmed, non-empty value of `name`, if present and valid UTF-8.
    fn header(&self, name: &str) -> Option<&str>;

    /// Token from an `Authorization: Bearer <token>` header.
    fn bearer_token(&self) -> Option<&str> {
        let value = self.header("authorization")?;
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }
}

impl HeaderReader for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
