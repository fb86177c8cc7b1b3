//! Command handlers for the `recipegate` binary.

mod quota;
mod serve;

pub(crate) use quota::{cmd_estimate, cmd_quota};
pub(crate) use serve::cmd_serve;

use std::sync::Arc;

use clap::Subcommand;

use recipegate::clock::SystemClock;
use recipegate::store::json_file::JsonFileBackend;
use recipegate::store::{QuotaBackend, QuotaStore};
use recipegate::{GateConfig, UsageGovernor};

/// Wire a governor against the configured file-backed store.
pub(crate) fn build_governor(config: &GateConfig) -> Arc<UsageGovernor> {
    let backend: Arc<dyn QuotaBackend> = match &config.store_path {
        Some(path) => Arc::new(JsonFileBackend::new(path)),
        None => Arc::new(JsonFileBackend::at_default_path()),
    };
    let store = Arc::new(QuotaStore::new(backend));
    Arc::new(UsageGovernor::new(
        store,
        config.limits,
        Arc::new(SystemClock),
    ))
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Run the usage governance API server.
    Serve {
        /// Meter each forwarded address separately instead of sharing the
        /// global scope.
        #[arg(long)]
        per_caller: bool,
    },
    /// Inspect or reset quota counters.
    Quota {
        #[command(subcommand)]
        action: QuotaSubcommand,
    },
    /// Estimate the token cost of a prompt.
    Estimate {
        /// The prompt text.
        text: String,
    },
}

/// `recipegate quota` subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum QuotaSubcommand {
    /// Print current counters, limits and utilisation for a scope.
    Status {
        /// Scope to inspect (default: global).
        #[arg(long, default_value = "global")]
        scope: String,
    },
    /// Zero counters for a scope.
    Reset {
        /// Which counter family: recipe, assistant or all.
        #[arg(long, default_value = "all")]
        kind: String,
        /// Which window: minute, day, month or all.
        #[arg(long, default_value = "all")]
        timeframe: String,
        /// Scope to reset (default: global).
        #[arg(long, default_value = "global")]
        scope: String,
    },
}
