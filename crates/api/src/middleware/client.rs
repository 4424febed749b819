//! Client address and user-agent capture.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use cultura_core::context::RequestContext;

/// Proxy headers consulted for the client address, in order.
const FORWARDING_HEADERS: [&str; 2] = ["x-forwarded-for", "x-real-ip"];

/// The [`RequestContext`] of the current request.
///
/// The address is the first public IP found in `X-Forwarded-For` or
/// `X-Real-IP`, then the socket peer address. When neither resolves the
/// context carries no address and the audit trail records `0.0.0.0`.
#[derive(Debug, Clone, Default)]
pub struct ClientContext(pub RequestContext);

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let ip = forwarded_public_ip(&parts.headers).or(peer);
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        Ok(ClientContext(RequestContext {
            ip: ip.map(|ip| ip.to_string()),
            user_agent,
        }))
    }
}

fn forwarded_public_ip(headers: &HeaderMap) -> Option<IpAddr> {
    FORWARDING_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .flat_map(|value| value.split(','))
        .filter_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
        .find(is_public)
}

/// Rejects private, loopback, link-local and otherwise reserved ranges.
fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.octets()[0] == 0
                || v4.octets()[0] >= 240)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, Request};

    use super::*;

    async fn extract(request: Request<()>) -> RequestContext {
        let (mut parts, _) = request.into_parts();
        let ClientContext(ctx) = ClientContext::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        ctx
    }

    #[tokio::test]
    async fn first_public_forwarded_address_wins() {
        let request = Request::builder()
            .header("x-forwarded-for", "10.0.0.4, 192.168.1.9, 203.0.113.7, 198.51.100.1")
            .header("x-real-ip", "198.51.100.99")
            .header(USER_AGENT, "Mozilla/5.0")
            .body(())
            .unwrap();

        let ctx = extract(request).await;
        assert_eq!(ctx.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(ctx.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn real_ip_is_used_when_forwarded_for_is_private() {
        let request = Request::builder()
            .header("x-forwarded-for", "127.0.0.1")
            .header("x-real-ip", "198.51.100.99")
            .body(())
            .unwrap();

        assert_eq!(extract(request).await.ip.as_deref(), Some("198.51.100.99"));
    }

    #[tokio::test]
    async fn socket_address_is_the_fallback() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "not-an-ip, 10.1.1.1")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([172, 16, 0, 5], 41000))));

        assert_eq!(extract(request).await.ip.as_deref(), Some("172.16.0.5"));
    }

    #[tokio::test]
    async fn nothing_resolves_to_the_unknown_address() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static("   "));

        let ctx = extract(request).await;
        assert_eq!(ctx.ip, None);
        assert_eq!(ctx.user_agent, None);
        assert_eq!(ctx.ip_or_unknown(), "0.0.0.0");
    }

    #[test]
    fn ipv6_private_ranges_are_not_public() {
        assert!(!is_public(&"fd00::1".parse().unwrap()));
        assert!(!is_public(&"fe80::1".parse().unwrap()));
        assert!(!is_public(&"::1".parse().unwrap()));
        assert!(is_public(&"2001:db8::1".parse().unwrap()));
    }
}
