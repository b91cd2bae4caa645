//! Request logging: every inbound request becomes a traffic event.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use tracing::warn;

use super::state::AppState;

pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Record `(identity, path, now)` and pass the request on. A failed insert is
/// logged and never fails the request.
pub async fn record_request(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let identity = client_identity(&req, state.trust_forwarded_for);
    let path = req.uri().path().to_string();
    let timestamp = Utc::now();
    let engine = state.engine.clone();

    match tokio::task::spawn_blocking(move || engine.ingest(&identity, &path, timestamp)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "failed to record traffic event"),
        Err(e) => warn!(error = %e, "traffic ingest task failed"),
    }

    next.run(req).await
}

/// Source address of the request: the first `X-Forwarded-For` hop when
/// trusted, else the peer socket address.
pub fn client_identity(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(forwarded: Option<&str>, peer: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/api/v1/health");
        if let Some(value) = forwarded {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(addr) = peer {
            req.extensions_mut()
                .insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        }
        req
    }

    #[test]
    fn test_peer_address_is_identity() {
        let req = request(Some("203.0.113.7"), Some("10.0.0.5:51234"));
        assert_eq!(client_identity(&req, false), "10.0.0.5");
    }

    #[test]
    fn test_forwarded_for_when_trusted() {
        let req = request(Some(" 203.0.113.7 , 10.1.1.1"), Some("10.0.0.5:51234"));
        assert_eq!(client_identity(&req, true), "203.0.113.7");

        let req = request(Some(""), Some("10.0.0.5:51234"));
        assert_eq!(client_identity(&req, true), "10.0.0.5");
    }

    #[test]
    fn test_unknown_without_peer() {
        assert_eq!(client_identity(&request(None, None), true), UNKNOWN_IDENTITY);
    }
}
