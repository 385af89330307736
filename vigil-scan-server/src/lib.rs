//! The Vigil scan service.
//!
//! `POST /scan` runs nmap against a caller-supplied target. Every request
//! passes bearer-token authentication first and the per-caller rate
//! limiter second; only then is the body looked at.

pub mod auth;
pub mod cli;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod state;
pub mod telemetry;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub use auth::{AuthError, Claims, TokenVerifier};
pub use error::{AppError, AppResult};
pub use rate_limit::{Decision, RateLimiter, Window};
pub use state::AppState;

/// Builds the service router. Layers added later run first, so a scan
/// request is authenticated before it is counted against a budget.
pub fn create_app(state: AppState) -> Router {
    let scan_routes = Router::new()
        .route("/scan", post(handlers::scan))
        .route_layer(from_fn_with_state(
            state.clone(),
            rate_limit::limit_scans,
        ))
        .route_layer(from_fn_with_state(state.clone(), auth::require_bearer));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(scan_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
