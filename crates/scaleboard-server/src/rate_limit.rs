//! Fixed-window rate limiting keyed by client IP.
//!
//! Two limiters are mounted: a general one on every `/api` route and a strict
//! one (3 per minute) shared by the two credential endpoints. Rejected
//! requests get a 429 with a `Retry-After` header.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::AppError;

/// Number of tracked clients above which expired windows are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// A fixed-window request counter per client key.
#[derive(Debug)]
pub struct RateLimiter {
    max: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// The credential-endpoint limiter: 3 requests per minute.
    #[must_use]
    pub fn strict() -> Self {
        Self::new(3, Duration::from_secs(60))
    }

    /// Count a request from `key` and decide whether it may proceed.
    pub async fn check(&self, key: &str) -> Decision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max {
            let elapsed = now.duration_since(entry.started);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }

        entry.count = entry.count.saturating_add(1);
        Decision::Allowed {
            remaining: self.max.saturating_sub(entry.count),
        }
    }

    fn describe(&self) -> String {
        let secs = self.window.as_secs();
        if secs >= 60 && secs % 60 == 0 {
            format!("{} requests per {} minute(s)", self.max, secs / 60)
        } else {
            format!("{} requests per {secs} second(s)", self.max)
        }
    }
}

/// Identify the client: peer address, then `X-Forwarded-For`, then a shared
/// bucket.
fn client_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    if let Some(ip) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_owned();
    }

    "unknown".to_owned()
}

/// Middleware that enforces `limiter` before calling the handler.
pub async fn enforce(State(limiter): State<Arc<RateLimiter>>, req: Request, next: Next) -> Response {
    let key = client_key(&req);
    match limiter.check(&key).await {
        Decision::Allowed { .. } => next.run(req).await,
        Decision::Limited { retry_after } => {
            let retry_after_secs = retry_after.as_secs().max(1);
            tracing::warn!(client = %key, path = %req.uri().path(), retry_after_secs, "rate limit exceeded");
            AppError::RateLimited {
                retry_after_secs,
                message: format!("Too many requests, please try again later. Limit: {}", limiter.describe()),
            }
            .into_response()
        }
    }
}
