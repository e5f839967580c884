//! Rate limiting for API endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking. A generous quota
//! covers the whole API; a strict quota sits on the credential endpoints
//! to slow down brute force attempts.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

/// Per-IP keyed rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

#[derive(Clone)]
pub struct RateLimitConfig {
    /// Whole-API quota (generous: 60 requests per minute per IP)
    pub general: Arc<IpLimiter>,
    /// Credential endpoint quota (strict: 10 requests per minute per IP)
    pub auth: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// Create rate limiters with production quotas.
    pub fn new() -> Self {
        Self::with_quotas(60, 10)
    }

    /// Quotas high enough that tests never trip them.
    pub fn relaxed() -> Self {
        Self::with_quotas(100_000, 100_000)
    }

    fn with_quotas(general_per_min: u32, auth_per_min: u32) -> Self {
        let one = NonZeroU32::new(1).unwrap_or(NonZeroU32::MIN);
        Self {
            general: Arc::new(RateLimiter::keyed(Quota::per_minute(
                NonZeroU32::new(general_per_min).unwrap_or(one),
            ))),
            auth: Arc::new(RateLimiter::keyed(Quota::per_minute(
                NonZeroU32::new(auth_per_min).unwrap_or(one),
            ))),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware applying the whole-API quota.
pub async fn rate_limit_general(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(&request);
    match config.general.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        )
            .into_response(),
    }
}

/// Middleware applying the strict quota on credential endpoints.
pub async fn rate_limit_auth(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(&request);
    match config.auth.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many authentication attempts. Please wait before trying again.",
        )
            .into_response(),
    }
}

/// Extract the client IP for rate limit keying. Prefers X-Forwarded-For
/// (reverse proxy), falls back to the connection address. Requests with
/// neither share one bucket rather than bypassing the limiter.
fn extract_client_ip(request: &Request) -> String {
    use axum::extract::ConnectInfo;
    use std::net::SocketAddr;

    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            if let Some(first_ip) = value.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
