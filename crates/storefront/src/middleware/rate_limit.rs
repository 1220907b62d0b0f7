//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `checkout_rate_limiter`: order placement (~10/min per IP)
//! - `chat_rate_limiter`: assistant messages, which cost an API call (~20/min per IP)
//! - `contact_rate_limiter`: contact form, which mails the admin (~5/min per IP)
//!
//! Limits key on the TCP peer address. `X-Forwarded-For` and `X-Real-IP` are
//! only read when the peer is one of the configured trusted proxies, since
//! any client can send them.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Client IP: the peer address, or what a trusted proxy says the client was.
#[derive(Clone, Default)]
pub struct ClientIpKeyExtractor {
    trusted_proxies: Arc<[IpAddr]>,
}

impl ClientIpKeyExtractor {
    #[must_use]
    pub fn new(trusted_proxies: &[IpAddr]) -> Self {
        Self {
            trusted_proxies: trusted_proxies.into(),
        }
    }

    fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.trusted_proxies.contains(ip)
    }

    /// The address a trusted proxy forwarded for.
    ///
    /// Walks `X-Forwarded-For` from the right, skipping our own proxies, so
    /// entries the client prepended are never reached.
    fn forwarded_client(&self, headers: &HeaderMap) -> Option<IpAddr> {
        let chain: Vec<&str> = headers
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .collect();

        for hop in chain.iter().rev() {
            // A malformed hop means the chain can't be trusted past this point.
            let ip = hop.trim().parse::<IpAddr>().ok()?;
            if !self.is_trusted(&ip) {
                return Some(ip);
            }
        }

        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    }
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)?;

        if !self.is_trusted(&peer) {
            return Ok(peer);
        }

        Ok(self.forwarded_client(req.headers()).unwrap_or(peer))
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for checkout: ~10 requests per minute per IP.
///
/// # Panics
///
/// This function will not panic. `per_second(6)` and `burst_size(5)` are
/// always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn checkout_rate_limiter(trusted_proxies: &[IpAddr]) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trusted_proxies))
        .per_second(6) // Replenish 1 token every 6 seconds
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Create rate limiter for chat: ~20 requests per minute per IP.
///
/// # Panics
///
/// This function will not panic. `per_second(3)` and `burst_size(10)` are
/// always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn chat_rate_limiter(trusted_proxies: &[IpAddr]) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trusted_proxies))
        .per_second(3)
        .burst_size(10)
        .finish()
        .expect("rate limiter config with per_second(3) and burst_size(10) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Create rate limiter for the contact form: ~5 requests per minute per IP.
///
/// # Panics
///
/// This function will not panic. `per_second(12)` and `burst_size(3)` are
/// always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn contact_rate_limiter(trusted_proxies: &[IpAddr]) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trusted_proxies))
        .per_second(12)
        .burst_size(3)
        .finish()
        .expect("rate limiter config with per_second(12) and burst_size(3) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tower_governor::key_extractor::KeyExtractor;

    const PROXY: &str = "10.0.0.1";

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn request_from(peer: &str, headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::new(ip(peer), 4000)));
        req
    }

    fn behind_proxy() -> ClientIpKeyExtractor {
        ClientIpKeyExtractor::new(&[ip(PROXY)])
    }

    #[test]
    fn test_headers_ignored_without_trusted_proxy() {
        let req = request_from(
            "192.0.2.9",
            &[
                ("x-forwarded-for", "203.0.113.7"),
                ("x-real-ip", "198.51.100.2"),
            ],
        );
        assert_eq!(
            ClientIpKeyExtractor::default().extract(&req).unwrap(),
            ip("192.0.2.9")
        );
    }

    #[test]
    fn test_headers_ignored_from_untrusted_peer() {
        let req = request_from("192.0.2.9", &[("x-forwarded-for", "203.0.113.7")]);
        assert_eq!(behind_proxy().extract(&req).unwrap(), ip("192.0.2.9"));
    }

    #[test]
    fn test_rightmost_untrusted_hop_wins() {
        // The client sent a forged first entry; the proxy appended the real one.
        let req = request_from(PROXY, &[("x-forwarded-for", "1.2.3.4, 203.0.113.7")]);
        assert_eq!(behind_proxy().extract(&req).unwrap(), ip("203.0.113.7"));
    }

    #[test]
    fn test_rotating_forged_entries_share_a_key() {
        let extractor = behind_proxy();
        let first = request_from(PROXY, &[("x-forwarded-for", "1.1.1.1, 203.0.113.7")]);
        let second = request_from(PROXY, &[("x-forwarded-for", "2.2.2.2, 203.0.113.7")]);
        assert_eq!(
            extractor.extract(&first).unwrap(),
            extractor.extract(&second).unwrap()
        );
    }

    #[test]
    fn test_chained_trusted_proxies_skipped() {
        let extractor = ClientIpKeyExtractor::new(&[ip(PROXY), ip("10.0.0.2")]);
        let req = request_from(PROXY, &[("x-forwarded-for", "203.0.113.7, 10.0.0.2")]);
        assert_eq!(extractor.extract(&req).unwrap(), ip("203.0.113.7"));
    }

    #[test]
    fn test_malformed_hop_falls_back_to_peer() {
        let req = request_from(PROXY, &[("x-forwarded-for", "203.0.113.7, garbage")]);
        assert_eq!(behind_proxy().extract(&req).unwrap(), ip(PROXY));
    }

    #[test]
    fn test_real_ip_from_trusted_proxy() {
        let req = request_from(PROXY, &[("x-real-ip", "198.51.100.2")]);
        assert_eq!(behind_proxy().extract(&req).unwrap(), ip("198.51.100.2"));
    }

    #[test]
    fn test_no_peer_address_is_an_error() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(())
            .unwrap();
        assert!(behind_proxy().extract(&req).is_err());
    }
}
