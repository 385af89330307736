//! Per-caller, multi-window rate limiting for scan requests.
//!
//! Every caller keeps a log of admitted request instants. A request is
//! admitted only when each window still has room, and the check and the
//! record happen under one lock so concurrent bursts cannot overshoot.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub period: Duration,
    pub limit: usize,
}

impl Window {
    pub const fn new(period: Duration, limit: usize) -> Self {
        Self { period, limit }
    }
}

/// 5 per minute, 10 per hour, 100 per day.
pub const SCAN_WINDOWS: [Window; 3] = [
    Window::new(Duration::from_secs(60), 5),
    Window::new(Duration::from_secs(3600), 10),
    Window::new(Duration::from_secs(86_400), 100),
];

/// How often idle callers are dropped from memory.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// `retry_after` is the wait until every exceeded window has room.
    Limited { retry_after: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    windows: Vec<Window>,
    horizon: Duration,
    callers: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(SCAN_WINDOWS.to_vec())
    }
}

impl RateLimiter {
    pub fn new(windows: Vec<Window>) -> Self {
        let horizon = windows
            .iter()
            .map(|window| window.period)
            .max()
            .unwrap_or_default();
        Self {
            windows,
            horizon,
            callers: Mutex::new(HashMap::new()),
        }
    }

    /// Checks every window and, when all have room, records the request.
    pub fn check(&self, caller: &str) -> Decision {
        let now = Instant::now();
        let mut callers = self.callers.lock();
        let history = callers.entry(caller.to_string()).or_default();

        while history
            .front()
            .is_some_and(|&at| now.duration_since(at) >= self.horizon)
        {
            history.pop_front();
        }

        let mut retry_after: Option<Duration> = None;
        for window in &self.windows {
            let inside = history
                .iter()
                .rev()
                .take_while(|&&at| now.duration_since(at) < window.period)
                .count();
            if inside < window.limit {
                continue;
            }
            // The oldest admitted request still inside this window.
            let wait = history
                .get(history.len() - inside)
                .map(|&oldest| window.period - now.duration_since(oldest))
                .unwrap_or(window.period);
            retry_after = Some(retry_after.map_or(wait, |w| w.max(wait)));
        }

        match retry_after {
            Some(retry_after) => Decision::Limited { retry_after },
            None => {
                history.push_back(now);
                Decision::Allowed
            }
        }
    }

    /// Forgets callers with no request inside the longest window.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut callers = self.callers.lock();
        let before = callers.len();
        callers.retain(|_, history| {
            history
                .back()
                .is_some_and(|&at| now.duration_since(at) < self.horizon)
        });
        before - callers.len()
    }

    pub fn tracked_callers(&self) -> usize {
        self.callers.lock().len()
    }
}

/// Periodically prunes idle callers until the runtime shuts down.
pub fn spawn_pruner(
    limiter: Arc<RateLimiter>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.prune();
            if removed > 0 {
                debug!(removed, "pruned idle rate-limit callers");
            }
        }
    })
}

/// Caller identity: the first `X-Forwarded-For` hop when proxy headers are
/// trusted, else the peer address.
pub fn caller_id(request: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|first| !first.is_empty());
        if let Some(first) = forwarded {
            return first.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit_scans(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let caller = caller_id(&request, state.trust_proxy_headers);
    match state.limiter.check(&caller) {
        Decision::Allowed => next.run(request).await,
        Decision::Limited { retry_after } => {
            warn!(
                caller = %caller,
                retry_after = ?retry_after,
                "scan rate limit exceeded"
            );
            AppError::rate_limited(retry_after).into_response()
        }
    }
}
