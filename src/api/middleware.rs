//! Rate-limit middleware.
//!
//! Classifies each request path into a call type, resolves the caller's
//! quota scope, and asks the [`crate::governor::UsageGovernor`] for an
//! admission decision. Paths that match neither upstream bypass the
//! limiter entirely.
//!
//! Rejections become HTTP 429 with a `Retry-After` header derived from the
//! breached window. Infrastructure failures fail OPEN: the request
//! proceeds unmetered with a loud log, because availability of the product
//! outranks strict enforcement.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::server::AppState;
use crate::estimator::estimate;
use crate::governor::{CallType, Decision};

/// Most bytes of an assistant request body the estimator will buffer.
const ESTIMATE_BODY_LIMIT: usize = 1024 * 1024;

/// Path prefix routed to the recipe upstream.
const RECIPE_PREFIX: &str = "/api/recipes";
/// Path prefix routed to the assistant upstream.
const ASSISTANT_PREFIX: &str = "/api/assistant";

/// Admission details stashed in request extensions for the downstream
/// handler, which needs the estimate to reconcile actual token usage after
/// the upstream call completes.
#[derive(Debug, Clone)]
pub struct AdmittedCall {
    pub scope_id: String,
    pub call_type: CallType,
    pub estimated_tokens: u32,
}

/// Map a request path to the upstream it is metered against.
///
/// `None` means the path is not governed and bypasses the limiter.
pub fn classify(path: &str) -> Option<CallType> {
    if path.starts_with(RECIPE_PREFIX) {
        Some(CallType::RecipeApi)
    } else if path.starts_with(ASSISTANT_PREFIX) {
        Some(CallType::Assistant)
    } else {
        None
    }
}

/// Axum middleware enforcing the admission decision.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(call_type) = classify(request.uri().path()) else {
        return next.run(request).await;
    };

    let scope_id = state.resolver.resolve(request.headers());

    // Assistant calls are pre-admitted on an estimate of the prompt; the
    // body has to be buffered to read it, then restored for the handler.
    let (mut request, estimated_tokens) = match call_type {
        CallType::RecipeApi => (request, 0),
        CallType::Assistant => match estimate_request_tokens(request).await {
            Ok(buffered) => buffered,
            Err(response) => return response,
        },
    };

    match state
        .governor
        .check_and_record(&scope_id, call_type, estimated_tokens)
        .await
    {
        Ok(Decision::Allowed) => {
            request.extensions_mut().insert(AdmittedCall {
                scope_id,
                call_type,
                estimated_tokens,
            });
            next.run(request).await
        }
        Ok(Decision::Blocked {
            limit,
            retry_after_secs,
        }) => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "rate_limited",
                    "limit": limit,
                    "retry_after_secs": retry_after_secs,
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            response
        }
        Err(e) => {
            // Fail-open: a broken limiter must not take down the product.
            tracing::error!(
                scope = %scope_id,
                call_type = %call_type,
                error = %e,
                "usage governor unavailable; failing open"
            );
            next.run(request).await
        }
    }
}

/// Buffer the request body, estimate the prompt's token cost, and rebuild
/// the request with the buffered bytes so the handler sees it intact.
///
/// A body over [`ESTIMATE_BODY_LIMIT`] (or one that fails to read) is
/// rejected with 413 rather than forwarded truncated. A readable non-JSON
/// body estimates to 0 — the call still gets charged on reconciliation.
async fn estimate_request_tokens(
    request: Request<Body>,
) -> std::result::Result<(Request<Body>, u32), Response> {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, ESTIMATE_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "assistant request body rejected before admission");
            return Err((
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({
                    "error": "payload_too_large",
                    "max_bytes": ESTIMATE_BODY_LIMIT,
                })),
            )
                .into_response());
        }
    };

    let tokens = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|v| prompt_text(&v))
        .map(|text| estimate(&text))
        .unwrap_or(0);

    Ok((Request::from_parts(parts, Body::from(bytes)), tokens))
}

/// Pull the user's prompt out of an assistant request body.
fn prompt_text(body: &serde_json::Value) -> Option<String> {
    for field in ["prompt", "message"] {
        if let Some(text) = body.get(field).and_then(|v| v.as_str()) {
            return Some(text.to_string());
        }
    }
    None
}
