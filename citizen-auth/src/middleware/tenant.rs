//! Tenant resolution from the `x-tenant` header.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use service_core::error::AppError;
use service_core::middleware::headers::{HeaderReader, TENANT_HEADER};
use service_core::storage::is_valid_tenant_id;

/// Tenant id of the current request, lowercased and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant(pub String);

impl Tenant {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn resolve_tenant<H: HeaderReader + ?Sized>(headers: &H) -> Result<Tenant, AppError> {
    let raw = headers
        .header(TENANT_HEADER)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Header x-tenant fehlt")))?;

    let tenant = raw.to_lowercase();
    if !is_valid_tenant_id(&tenant) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Ungültige Mandanten-ID"
        )));
    }
    Ok(Tenant(tenant))
}

#[async_trait]
impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        resolve_tenant(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_tenant_is_case_folded() {
        assert_eq!(resolve_tenant(&headers(" Fulda ")).unwrap(), Tenant("fulda".into()));
        assert_eq!(
            resolve_tenant(&headers("bad-hersfeld")).unwrap().as_str(),
            "bad-hersfeld"
        );
    }

    #[test]
    fn test_invalid_or_missing_tenant_is_bad_request() {
        for value in ["fulda/../x", "bad_hersfeld", "a b"] {
            let err = resolve_tenant(&headers(value)).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }

        let too_long = "a".repeat(41);
        let mut map = HeaderMap::new();
        map.insert(TENANT_HEADER, HeaderValue::from_str(&too_long).unwrap());
        assert!(resolve_tenant(&map).is_err());

        let err = resolve_tenant(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
