//! Configuration types and loading.
//!
//! Four integer ceilings govern the two metered upstreams; they are fixed
//! for the process lifetime — there is no dynamic reconfiguration. Config
//! is read from a TOML file (default `~/.recipegate/config.toml`), with a
//! handful of environment overrides applied on top. A missing file yields
//! defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// Static ceilings for the metered upstreams. Immutable once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallLimits {
    /// Recipe-API calls allowed per minute.
    pub hits_per_minute: u32,
    /// Recipe-API calls allowed per calendar month.
    pub hits_per_month: u32,
    /// Assistant calls allowed per day.
    pub assistant_calls_per_day: u32,
    /// Assistant tokens allowed per day.
    pub assistant_tokens_per_day: u64,
}

impl Default for CallLimits {
    fn default() -> Self {
        Self {
            hits_per_minute: 5,
            hits_per_month: 500,
            assistant_calls_per_day: 30,
            assistant_tokens_per_day: 10_000,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: 127.0.0.1).
    pub bind: String,
    /// API port.
    pub port: u16,
    /// Bearer token required by the administrative reset endpoint.
    ///
    /// `None` disables the admin endpoint entirely; role management proper
    /// is delegated to the surrounding auth layer.
    pub admin_token: Option<String>,
    /// Origin allowed by CORS for the usage dashboard.
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8188,
            admin_token: None,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Path of the persisted quota document. `None` uses
    /// `~/.recipegate/quota/usage.json`.
    ///
    /// Kept ahead of the table-valued fields so TOML serialization emits
    /// it before `[server]`.
    pub store_path: Option<PathBuf>,
    pub server: ServerConfig,
    pub limits: CallLimits,
}

impl GateConfig {
    /// Canonical config file location: `~/.recipegate/config.toml`.
    pub fn default_path() -> PathBuf {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join(".recipegate").join("config.toml")
    }

    /// Load from `path`, falling back to defaults when the file does not
    /// exist, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(data) => toml::from_str(&data)
                .map_err(|e| GateError::Config(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(GateError::Config(format!("{}: {e}", path.display()))),
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides, applied after the file is parsed.
    ///
    /// `RECIPEGATE_ADMIN_TOKEN`, `RECIPEGATE_BIND` and `RECIPEGATE_PORT`
    /// cover the deployment-specific knobs; the ceilings are file-only.
    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("RECIPEGATE_ADMIN_TOKEN") {
            if !token.is_empty() {
                self.server.admin_token = Some(token);
            }
        }
        if let Ok(bind) = std::env::var("RECIPEGATE_BIND") {
            if !bind.is_empty() {
                self.server.bind = bind;
            }
        }
        if let Ok(port) = std::env::var("RECIPEGATE_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
    }
}
