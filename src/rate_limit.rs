//! Rate limiting for the login endpoint.
//!
//! Token bucket per client IP so password guessing stays slow.

use axum::{
    extract::{Request, State},
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::IpAddr, num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::extract_client_ip;

pub type IpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Sustained login attempts per second per IP
pub const LOGIN_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();
/// Login attempts a single IP may make back to back
pub const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();

#[derive(Clone)]
pub struct LoginRateLimit {
    limiter: Arc<IpLimiter>,
    /// Header carrying the client IP when behind a proxy
    ip_header: Option<HeaderName>,
}

impl LoginRateLimit {
    pub fn new(ip_header: Option<HeaderName>) -> Self {
        Self::with_quota(
            Quota::per_second(LOGIN_PER_SEC).allow_burst(LOGIN_BURST),
            ip_header,
        )
    }

    pub fn with_quota(quota: Quota, ip_header: Option<HeaderName>) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            ip_header,
        }
    }
}

/// Middleware limiting login attempts per client IP.
pub async fn rate_limit_login(
    State(config): State<LoginRateLimit>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.ip_header.as_ref()) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, "Rejecting login without client IP");
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match config.limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many authentication attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}
