//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket per client IP to slow down credential guessing. Each
//! login attempt costs one backend round-trip, so the limiter also keeps a
//! single client from hammering the backend.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::{ClientIpSource, extract_client_ip};

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const DEFAULT_PER_MINUTE: NonZeroU32 = NonZeroU32::new(10).unwrap();
const DEFAULT_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();

/// Login attempt limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginRateSettings {
    /// Sustained attempts per minute per IP
    pub per_minute: NonZeroU32,
    /// Attempts allowed in a burst
    pub burst: NonZeroU32,
}

impl Default for LoginRateSettings {
    fn default() -> Self {
        Self {
            per_minute: DEFAULT_PER_MINUTE,
            burst: DEFAULT_BURST,
        }
    }
}

/// Rate limiting state for the login route.
#[derive(Clone)]
pub struct LoginRateLimit {
    pub limiter: Arc<IpLimiter>,
    pub ip_source: ClientIpSource,
}

impl LoginRateLimit {
    pub fn new(settings: LoginRateSettings, ip_source: ClientIpSource) -> Self {
        let quota = Quota::per_minute(settings.per_minute).allow_burst(settings.burst);
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            ip_source,
        }
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<LoginRateLimit>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, &config.ip_source) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, "Unable to determine client IP for login");
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match config.limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}
