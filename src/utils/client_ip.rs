//! Client address extraction from HTTP requests.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, request::Parts};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::state::AppState;

/// Resolves the originating client address of a request.
///
/// When `behind_proxy` is set, the first entry of `X-Forwarded-For` wins,
/// then `X-Real-IP`. Header values must parse as an IP address (optionally
/// with a port) and are re-rendered in canonical form; anything else is
/// ignored. Otherwise (or when neither header is usable) the peer socket
/// address is used. Falls back to `"unknown"`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, behind_proxy: bool) -> String {
    if behind_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(parse_ip);

        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_ip);

        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    let value = value.trim();
    IpAddr::from_str(value)
        .ok()
        .or_else(|| SocketAddr::from_str(value).ok().map(|addr| addr.ip()))
}

/// Extractor yielding the client address resolved by [`client_ip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(client_ip(&parts.headers, peer, state.behind_proxy)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.7:51234".parse().unwrap())
    }

    #[test]
    fn test_peer_address_without_proxy() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer(), false), "10.0.0.7");
    }

    #[test]
    fn test_forwarded_headers_ignored_without_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(client_ip(&headers, peer(), false), "10.0.0.7");
    }

    #[test]
    fn test_first_forwarded_entry_behind_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 198.51.100.2"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.1"));
        assert_eq!(client_ip(&headers, peer(), true), "203.0.113.9");
    }

    #[test]
    fn test_real_ip_fallback_behind_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static(" 192.0.2.1 "));
        assert_eq!(client_ip(&headers, peer(), true), "192.0.2.1");
    }

    #[test]
    fn test_empty_forwarded_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(client_ip(&headers, peer(), true), "10.0.0.7");
    }

    #[test]
    fn test_garbage_forwarded_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip, 198.51.100.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.1"));
        assert_eq!(client_ip(&headers, peer(), true), "192.0.2.1");
    }

    #[test]
    fn test_oversized_headers_fall_back_to_peer() {
        let long = "a".repeat(64);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(&long).unwrap());
        headers.insert("x-real-ip", HeaderValue::from_str(&long).unwrap());
        assert_eq!(client_ip(&headers, peer(), true), "10.0.0.7");
    }

    #[test]
    fn test_forwarded_entry_is_canonicalized() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("2001:0db8:0000:0000:0000:0000:0000:0001"),
        );
        assert_eq!(client_ip(&headers, peer(), true), "2001:db8::1");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9:4431"));
        assert_eq!(client_ip(&headers, peer(), true), "203.0.113.9");
    }

    #[test]
    fn test_resolved_address_fits_storage_column() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("ffff:ffff:ffff:ffff:ffff:ffff:255.255.255.255"),
        );
        assert!(client_ip(&headers, peer(), true).len() <= 45);
    }

    #[test]
    fn test_ipv6_peer() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "[::1]:8080".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(addr), false), "::1");
    }

    #[test]
    fn test_unknown_without_any_source() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, None, true), "unknown");
    }
}
