//! Axum API server for the usage governance layer.
//!
//! The router carries the governance surface — usage query, administrative
//! reset, health — plus whatever upstream-proxy routes the embedding
//! application merges in. The rate-limit middleware wraps the whole
//! router; only paths under the governed prefixes are metered (see
//! [`super::middleware::classify`]).

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Method};
use axum::middleware as axum_mw;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::resolver::CallerResolver;
use crate::config::GateConfig;
use crate::governor::UsageGovernor;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Admission control; the only writer of quota counters.
    pub governor: Arc<UsageGovernor>,
    /// Maps inbound requests to quota scopes.
    pub resolver: Arc<dyn CallerResolver>,
    /// Bearer token for the administrative reset endpoint. `None`
    /// disables the endpoint.
    pub admin_token: Option<String>,
}

async fn get_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build the axum router.
///
/// `guarded` holds the embedding application's upstream-proxy routes
/// (recipe search, assistant chat); they are merged in before the
/// rate-limit layer is applied so the layer covers them. They share the
/// governance [`AppState`]; handlers that need their own state can carry
/// it via extensions.
pub fn build_router(
    state: AppState,
    cors_origin: &str,
    guarded: Router<Arc<AppState>>,
) -> Router {
    let shared_state = Arc::new(state);

    // CORS: only the dashboard origin may call the usage endpoints.
    let origin = cors_origin
        .parse::<axum::http::HeaderValue>()
        .unwrap_or_else(|_| {
            tracing::warn!("invalid cors origin {cors_origin:?}; using http://localhost:3000");
            axum::http::HeaderValue::from_static("http://localhost:3000")
        });
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
        ]);

    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/usage", get(super::routes::usage::get_usage))
        .route("/api/admin/reset", post(super::routes::admin::reset_usage))
        .merge(guarded)
        // Body size limit for extractors on the governance routes. Governed
        // assistant bodies are capped by the rate-limit middleware itself,
        // which buffers them first and rejects over-limit ones with 413.
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(axum_mw::from_fn_with_state(
            Arc::clone(&shared_state),
            super::middleware::rate_limit,
        ))
        .with_state(shared_state)
}

/// Start the API server.
pub async fn start_server(
    config: &GateConfig,
    state: AppState,
    guarded: Router<Arc<AppState>>,
) -> anyhow::Result<()> {
    let app = build_router(state, &config.server.cors_origin, guarded);
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("usage governance API listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::resolver::FixedScopeResolver;
    use crate::clock::SystemClock;
    use crate::config::CallLimits;
    use crate::store::memory::MemoryBackend;
    use crate::store::QuotaStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn make_state() -> AppState {
        let store = Arc::new(QuotaStore::new(Arc::new(MemoryBackend::new())));
        let governor =
            UsageGovernor::new(store, CallLimits::default(), Arc::new(SystemClock));
        AppState {
            governor: Arc::new(governor),
            resolver: Arc::new(FixedScopeResolver::new("global")),
            admin_token: Some("admin-test-token".into()),
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(make_state(), "http://localhost:3000", Router::new());
        let req = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_merged_guarded_routes_are_metered() {
        let guarded = Router::new().route(
            "/api/recipes/search",
            get(|| async { "results" }),
        );
        let app = build_router(make_state(), "http://localhost:3000", guarded);
        let req = Request::builder()
            .uri("/api/recipes/search")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_build_router_with_bad_cors_origin() {
        // An unparseable origin falls back to localhost rather than
        // panicking at startup.
        let _router = build_router(make_state(), "\u{0}", Router::new());
    }
}
