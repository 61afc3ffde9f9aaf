//! Fixed-window request limits, counted per client address.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::util::client_address;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the window resets
    pub reset: u64,
}

#[derive(Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    message: &'static str,
    trusted_proxies: usize,
    clients: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration, message: &'static str) -> Self {
        Self {
            limit,
            window,
            message,
            trusted_proxies: 0,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Key clients by `X-Forwarded-For` as reported by this many proxies.
    pub fn behind_proxies(mut self, trusted_proxies: usize) -> Self {
        self.trusted_proxies = trusted_proxies;
        self
    }

    /// 5 messages per 10 minutes.
    pub fn contact() -> Self {
        Self::new(
            5,
            Duration::from_secs(10 * 60),
            "Too many messages. Please try again later.",
        )
    }

    /// 10 attempts per 15 minutes.
    pub fn login() -> Self {
        Self::new(
            10,
            Duration::from_secs(15 * 60),
            "Too many login attempts. Please try again later.",
        )
    }

    pub fn check(&self, client: &str) -> Decision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Decision {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.retain(|_, window| now.duration_since(window.started) < self.window);

        let window = clients.entry(client.to_owned()).or_insert(Window {
            started: now,
            hits: 0,
        });
        window.hits = window.hits.saturating_add(1);

        let elapsed = now.duration_since(window.started);
        Decision {
            allowed: window.hits <= self.limit,
            limit: self.limit,
            remaining: self.limit.saturating_sub(window.hits),
            reset: self.window.saturating_sub(elapsed).as_secs().max(1),
        }
    }
}

fn set_header(response: &mut Response, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
}

pub async fn limit_requests(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let client = client_address(&parts, limiter.trusted_proxies);
    let decision = limiter.check(&client);

    let mut response = if decision.allowed {
        next.run(Request::from_parts(parts, body)).await
    } else {
        tracing::warn!(%client, path = %parts.uri.path(), "rate limit exceeded");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "success": false, "message": limiter.message })),
        )
            .into_response();
        set_header(&mut response, "retry-after", decision.reset);
        response
    };

    set_header(&mut response, "ratelimit-limit", decision.limit);
    set_header(&mut response, "ratelimit-remaining", decision.remaining);
    set_header(&mut response, "ratelimit-reset", decision.reset);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixth_message_is_refused() {
        let limiter = RateLimiter::contact();
        let now = Instant::now();

        for remaining in (0..5).rev() {
            let decision = limiter.check_at("203.0.113.9", now);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, remaining);
        }

        assert!(!limiter.check_at("203.0.113.9", now).allowed);
        assert!(limiter.check_at("198.51.100.4", now).allowed);
    }

    #[test]
    fn windows_expire() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), "slow down");
        let now = Instant::now();

        assert!(limiter.check_at("client", now).allowed);
        assert!(!limiter.check_at("client", now + Duration::from_secs(30)).allowed);
        assert!(limiter.check_at("client", now + Duration::from_secs(61)).allowed);
    }
}
