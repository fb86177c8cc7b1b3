//! Usage query route.
//!
//! `GET /api/usage?scope=<id>` returns the current counters, limits and
//! per-counter utilisation for a scope (default `global`). Dashboards and
//! the client advisor poll this; it is a read-only projection, never a
//! source of truth.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::server::AppState;
use crate::store::GLOBAL_SCOPE;

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    scope: Option<String>,
}

pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsageQuery>,
) -> Response {
    let scope = query.scope.as_deref().unwrap_or(GLOBAL_SCOPE);
    match state.governor.snapshot(scope).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            tracing::error!(scope = %scope, error = %e, "usage snapshot failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "usage store unavailable" })),
            )
                .into_response()
        }
    }
}
