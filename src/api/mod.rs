//! HTTP surface: admission middleware, usage query, administrative reset.

pub mod middleware;
pub mod resolver;
pub mod routes;
pub mod server;

pub use middleware::AdmittedCall;
pub use resolver::{CallerResolver, FixedScopeResolver, ForwardedAddrResolver};
pub use server::{build_router, start_server, AppState};
