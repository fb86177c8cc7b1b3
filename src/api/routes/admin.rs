//! Administrative reset route.
//!
//! `POST /api/admin/reset` zeroes the counters matching the requested type
//! and timeframe for a scope (default `global`). Gated on a static bearer
//! token; full role management is the job of the surrounding auth layer.
//! When no admin token is configured the endpoint plays dead with 404.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::server::AppState;
use crate::governor::{ResetKind, ResetTimeframe};
use crate::store::GLOBAL_SCOPE;

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(rename = "type")]
    pub kind: ResetKind,
    pub timeframe: ResetTimeframe,
    pub scope: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub async fn reset_usage(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ResetRequest>,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if bearer_token(&headers) != Some(expected) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let scope = request.scope.as_deref().unwrap_or(GLOBAL_SCOPE);
    match state
        .governor
        .reset(scope, request.kind, request.timeframe)
        .await
    {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => {
            tracing::error!(scope = %scope, error = %e, "administrative reset failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "usage store unavailable" })),
            )
                .into_response()
        }
    }
}
