//! Client address resolution.
//!
//! The resolved address keys every abuse decision, so resolution never
//! fails: the worst case is the raw peer string handed back unchanged.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the client address for a request.
///
/// The peer comes from axum's `ConnectInfo<SocketAddr>`; when that extension
/// is missing the raw peer is the empty string.
pub fn client_address<B>(request: &Request<B>) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    resolve_client_address(request.headers(), &peer)
}

/// First `X-Forwarded-For` entry if present, otherwise the host part of `peer`.
pub fn resolve_client_address(headers: &HeaderMap, peer: &str) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    if let Some(forwarded) = forwarded {
        let first = forwarded.split(',').next().unwrap_or(forwarded);
        return first.trim().to_string();
    }

    host_of(peer)
}

/// Strip the port from `host:port` / `[v6]:port`, or return `raw` unchanged.
pub fn host_of(raw: &str) -> String {
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }

    if let Some(rest) = raw.strip_prefix('[') {
        return match rest.split_once("]:") {
            Some((host, port)) if !port.contains(':') => host.to_string(),
            _ => raw.to_string(),
        };
    }

    match raw.split_once(':') {
        Some((host, port)) if !port.contains(':') => host.to_string(),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn forwarded_header_first_entry_wins() {
        let headers = forwarded(" 203.0.113.7 , 10.0.0.1, 10.0.0.2");
        assert_eq!(resolve_client_address(&headers, "192.0.2.1:1234"), "203.0.113.7");
    }

    #[test]
    fn empty_forwarded_header_falls_back_to_peer() {
        let headers = forwarded("");
        assert_eq!(resolve_client_address(&headers, "192.0.2.1:1234"), "192.0.2.1");
    }

    #[test]
    fn peer_port_is_stripped() {
        let headers = HeaderMap::new();
        assert_eq!(resolve_client_address(&headers, "192.0.2.1:1234"), "192.0.2.1");
        assert_eq!(resolve_client_address(&headers, "[2001:db8::1]:443"), "2001:db8::1");
        assert_eq!(resolve_client_address(&headers, "localhost:8080"), "localhost");
    }

    #[test]
    fn unsplittable_peer_is_returned_raw() {
        assert_eq!(host_of("192.0.2.1"), "192.0.2.1");
        assert_eq!(host_of("2001:db8::1"), "2001:db8::1");
        assert_eq!(host_of("[2001:db8::1]"), "[2001:db8::1]");
        assert_eq!(host_of(""), "");
    }

    #[test]
    fn request_without_connect_info_uses_empty_peer() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_address(&request), "");
    }

    #[test]
    fn request_with_connect_info_uses_peer_host() {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let peer: SocketAddr = "198.51.100.4:5555".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_address(&request), "198.51.100.4");
    }
}
