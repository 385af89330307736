use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde_json::{Value, json};
use tracing::info;
use vigil_core::scan::{split_args, validate_target};
use vigil_model::{ScanHost, ScanRequest};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /scan`. Runs behind authentication and rate limiting.
pub async fn scan(
    State(state): State<AppState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> AppResult<Json<Vec<ScanHost>>> {
    let Json(request) =
        payload.map_err(|rejection| {
            AppError::bad_request(rejection.body_text())
        })?;

    let Some(target) = request.target() else {
        return Err(AppError::bad_request("Target is required"));
    };
    validate_target(target)?;
    let raw_args = request
        .args
        .as_deref()
        .map(str::trim)
        .filter(|args| !args.is_empty())
        .unwrap_or(&state.default_args);
    let args = split_args(raw_args)?;

    info!(target = %target, args = %raw_args, "scan started");
    let hosts = state.executor.scan(target, &args).await?;
    info!(target = %target, hosts = hosts.len(), "scan finished");

    Ok(Json(hosts))
}
