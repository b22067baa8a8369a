//! Request throttle for the anonymous POST endpoints.
//!
//! Fixed window counter per client key. The window starts at the first request
//! of a key and resets once `window_seconds` have elapsed; within a window at
//! most `limit` requests pass. The limit can be changed while running.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::AuthError;
use crate::config::RateLimitConfig;
use crate::AppState;

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    /// Map of client key -> current window
    entries: DashMap<String, WindowEntry>,
    enabled: bool,
    limit: AtomicU32,
    window: Duration,
    trust_forwarded_headers: bool,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            enabled: config.enabled,
            limit: AtomicU32::new(config.requests_per_minute),
            window: Duration::from_secs(config.window_seconds),
            trust_forwarded_headers: config.trust_forwarded_headers,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit.load(Ordering::Relaxed)
    }

    /// Takes effect for the next request; running windows keep their count.
    pub fn set_limit(&self, limit: u32) {
        self.limit.store(limit, Ordering::Relaxed);
        tracing::info!(limit, "Rate limit changed");
    }

    /// Count a request for `key` and report whether it may proceed
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let limit = self.limit();
        // The entry guard holds the shard lock, so read-modify-write is atomic per key.
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                window_start: now,
            });

        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= limit {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Clean up expired entries to prevent memory leaks
    pub fn cleanup_expired(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        let expiry = self.window * 2;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.window_start) < expiry);
    }

    /// Get the number of tracked entries (for monitoring)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Key a request by its client.
    ///
    /// Forwarded headers are only honoured when configured; otherwise the peer
    /// address is used, and `"unknown"` when the server runs without connect info.
    fn client_key(&self, request: &Request<Body>) -> String {
        if self.trust_forwarded_headers {
            if let Some(ip) = forwarded_ip(request) {
                return ip;
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn forwarded_ip(request: &Request<Body>) -> Option<String> {
    // First entry of X-Forwarded-For is the original client
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    let real_ip = || {
        request
            .headers()
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    };

    forwarded.or_else(real_ip).map(str::to_string)
}

/// Middleware rejecting clients over the limit with 429, without running the handler
pub async fn throttle(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = state.rate_limiter.client_key(&request);

    if !state.rate_limiter.allow(&key) {
        tracing::warn!(client = %key, path = %request.uri().path(), "Request throttled");
        let err = AuthError::ThrottleExceeded;
        let window = state.rate_limiter.window.as_secs().to_string();
        return (
            err.status_code(),
            [(header::RETRY_AFTER, window)],
            err.public_message(),
        )
            .into_response();
    }

    next.run(request).await
}

/// Spawn a background task to periodically clean up expired rate limit entries
pub fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(cleanup_interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            rate_limiter.cleanup_expired();
            tracing::debug!(
                "Rate limiter cleanup complete, {} entries remaining",
                rate_limiter.entry_count()
            );
        }
    });
}
