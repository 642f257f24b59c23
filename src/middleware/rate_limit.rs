use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
    Extension,
};

use crate::{
    error::{ErrorMessage, HttpError},
    utils::token,
    AppState,
};

/// Sliding-window request counter per client key, kept in memory.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    pub fn is_allowed(&self, key: &str) -> bool {
        self.is_allowed_at(key, Instant::now())
    }

    fn is_allowed_at(&self, key: &str, now: Instant) -> bool {
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Drop clients whose whole history fell out of the window
        requests.retain(|_, hits| {
            hits.retain(|&timestamp| now.duration_since(timestamp) < self.window);
            !hits.is_empty()
        });

        let entry = requests.entry(key.to_string()).or_default();
        if entry.len() < self.max_requests {
            entry.push(now);
            true
        } else {
            false
        }
    }
}

/// Limits the public contact endpoints per client.
pub async fn contact_rate_limit(
    Extension(app_state): Extension<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client_id = client_id(
        req.headers(),
        peer,
        app_state.env.trust_proxy_headers,
        app_state.env.jwt_secret.as_bytes(),
    );

    if !app_state.contact_limiter.is_allowed(&client_id) {
        tracing::warn!("Rate limit hit for {} on {}", client_id, req.uri().path());
        return Err(HttpError::too_many_requests(
            ErrorMessage::TooManyRequests.to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Authenticated callers are keyed by token subject, everyone else by address.
///
/// `x-forwarded-for` and `x-real-ip` are client-controlled unless a reverse proxy
/// overwrites them, so they are only read when `trust_proxy_headers` is set.
/// Otherwise the socket peer address is the key.
pub fn client_id(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trust_proxy_headers: bool,
    jwt_secret: &[u8],
) -> String {
    let subject = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .and_then(|bearer| token::decode_token(bearer, jwt_secret).ok())
        .map(|claims| claims.sub);
    if let Some(subject) = subject {
        return format!("user:{}", subject);
    }

    let forwarded = trust_proxy_headers
        .then(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').next())
                .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
        })
        .flatten();

    forwarded
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::token::{create_token, ADMIN_ROLE};
    use axum::http::HeaderValue;

    #[test]
    fn test_limit_applies_per_key_within_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.is_allowed_at("a", start));
        assert!(limiter.is_allowed_at("a", start));
        assert!(!limiter.is_allowed_at("a", start + Duration::from_secs(1)));
        assert!(limiter.is_allowed_at("b", start + Duration::from_secs(1)));

        assert!(limiter.is_allowed_at("a", start + Duration::from_secs(61)));
    }

    #[test]
    fn test_client_id_prefers_token_subject() {
        let peer: Option<IpAddr> = Some("192.0.2.1".parse().unwrap());
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_id(&headers, peer, true, b"secret"), "203.0.113.7");

        let token = create_token("ops@example.com", ADMIN_ROLE, b"secret", 60).unwrap();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        assert_eq!(client_id(&headers, peer, true, b"secret"), "user:ops@example.com");
        assert_eq!(client_id(&headers, peer, true, b"wrong"), "203.0.113.7");

        assert_eq!(client_id(&HeaderMap::new(), None, true, b"secret"), "unknown");
    }

    #[test]
    fn test_forwarded_headers_ignored_without_trusted_proxy() {
        let peer: Option<IpAddr> = Some("192.0.2.1".parse().unwrap());
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.8"));

        assert_eq!(client_id(&headers, peer, false, b"secret"), "192.0.2.1");
        assert_eq!(client_id(&headers, None, false, b"secret"), "unknown");

        let mut real_ip_only = HeaderMap::new();
        real_ip_only.insert("x-real-ip", HeaderValue::from_static("203.0.113.8"));
        assert_eq!(client_id(&real_ip_only, peer, true, b"secret"), "203.0.113.8");
    }
}
