use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use service_core::middleware::rate_limit::client_ip;
use std::convert::Infallible;
use std::net::SocketAddr;

/// Caller IP used to key attempt limits. `"unknown"` when neither a
/// forwarded header nor a socket address is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(
            client_ip(&parts.headers, peer)
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        ))
    }
}
