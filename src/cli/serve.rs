//! Server command handler.

use std::sync::Arc;

use anyhow::Result;
use axum::Router;

use recipegate::api::{
    start_server, AppState, CallerResolver, FixedScopeResolver, ForwardedAddrResolver,
};
use recipegate::store::GLOBAL_SCOPE;
use recipegate::GateConfig;

use super::build_governor;

/// Handle `recipegate serve`.
///
/// Standalone mode carries no upstream-proxy routes of its own — the
/// governance endpoints are live and the embedding application merges its
/// guarded routes when using the crate as a library.
pub(crate) async fn cmd_serve(config: &GateConfig, per_caller: bool) -> Result<()> {
    let governor = build_governor(config);
    let resolver: Arc<dyn CallerResolver> = if per_caller {
        Arc::new(ForwardedAddrResolver)
    } else {
        Arc::new(FixedScopeResolver::new(GLOBAL_SCOPE))
    };

    let state = AppState {
        governor,
        resolver,
        admin_token: config.server.admin_token.clone(),
    };

    start_server(config, state, Router::new()).await
}
