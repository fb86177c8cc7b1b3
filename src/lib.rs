//! RecipeGate — usage governance for metered recipe and assistant APIs.
//!
//! A recipe-discovery product fronts two metered upstreams: a third-party
//! recipe API (per-minute and per-month call ceilings) and an AI
//! cooking-assistant API (per-day call and token ceilings). This crate is
//! the layer that keeps both within budget:
//!
//! - [`estimator`] — deterministic token-cost heuristics and response
//!   usage extraction
//! - [`store`] — durable per-scope counters with lazy window resets
//! - [`governor`] — admission control and post-hoc reconciliation
//! - [`api`] — axum middleware plus usage/admin endpoints
//! - [`advisor`] — non-authoritative client-side quota mirror
//!
//! The enforcement philosophy is fail-open: if the counter store is down,
//! requests proceed unmetered rather than failing the product.

pub mod advisor;
pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod estimator;
pub mod governor;
pub mod store;

pub use config::{CallLimits, GateConfig};
pub use error::{GateError, Result};
pub use governor::{CallType, Decision, UsageGovernor, UsageSnapshot};
pub use store::{QuotaRecord, QuotaStore};
