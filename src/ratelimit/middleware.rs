//! HTTP Rate Limiting Layer
//!
//! Axum middleware that charges one point of a tier per request, keyed by the
//! caller's address. Rejections become `429 Too Many Requests` with
//! `Retry-After` and `X-RateLimit-*` headers plus a JSON body.

use super::limiter::TieredRateLimiter;
use super::types::{Decision, Tier};
use crate::error::SearchError;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// How the caller identity that keys every counter is derived.
///
/// The peer address is used unless `trust_forwarded_for` is set. Only enable it
/// behind a reverse proxy that overwrites `X-Forwarded-For`; otherwise a client
/// picks its own key and escapes every tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientKeys {
    pub trust_forwarded_for: bool,
}

impl ClientKeys {
    pub fn new(trust_forwarded_for: bool) -> Self {
        Self { trust_forwarded_for }
    }

    /// First `X-Forwarded-For` hop when trusted, else the peer IP, else `"unknown"`.
    pub fn key_for(&self, request: &Request) -> String {
        if self.trust_forwarded_for {
            if let Some(forwarded) = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
            {
                return forwarded.to_string();
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Middleware state: which limiter to charge, under which tier, keyed how.
#[derive(Clone)]
pub struct TierGate {
    pub limiter: Arc<TieredRateLimiter>,
    pub tier: Tier,
    pub keys: ClientKeys,
}

impl TierGate {
    pub fn new(limiter: Arc<TieredRateLimiter>, tier: Tier, keys: ClientKeys) -> Self {
        Self {
            limiter,
            tier,
            keys,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedBody {
    pub success: bool,
    pub error: String,
    pub message: String,
    /// Seconds until the caller may retry.
    pub retry_after: u64,
}

pub async fn enforce(State(gate): State<TierGate>, request: Request, next: Next) -> Response {
    let key = gate.keys.key_for(&request);
    let decision = gate.limiter.consume(gate.tier, &key);

    match decision {
        Decision::Allowed { .. } => {
            let mut response = next.run(request).await;
            // The innermost (most specific) tier wins when several are stacked.
            apply_headers(response.headers_mut(), &decision, false);
            response
        }
        Decision::Rejected { retry_after, .. } => {
            tracing::debug!("Rejected {} request from {}", gate.tier, key);
            rejection(gate.tier, &decision, retry_after.as_millis() as u64)
        }
    }
}

fn rejection(tier: Tier, decision: &Decision, retry_after_ms: u64) -> Response {
    let retry_after_secs = retry_after_ms.div_ceil(1000);
    let error = SearchError::RateLimited {
        tier,
        retry_after_ms,
    };
    let body = RateLimitedBody {
        success: false,
        error: "Too Many Requests".to_string(),
        message: error.to_string(),
        retry_after: retry_after_secs,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::RETRY_AFTER,
        HeaderValue::from(retry_after_secs),
    );
    apply_headers(headers, decision, true);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &Decision, overwrite: bool) {
    let mut set = |name: &'static str, value: HeaderValue| {
        let name = HeaderName::from_static(name);
        if overwrite || !headers.contains_key(&name) {
            headers.insert(name, value);
        }
    };

    set(HEADER_LIMIT, HeaderValue::from(decision.limit()));
    set(HEADER_REMAINING, HeaderValue::from(decision.remaining()));
    if let Ok(value) = HeaderValue::from_str(&iso_timestamp(decision.reset_at())) {
        set(HEADER_RESET, value);
    }
}

/// RFC 3339 rendering of a millisecond timestamp.
pub fn iso_timestamp(ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
