//! Agent configuration loaded from an optional TOML file and `COLDIQ__*` environment variables.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | api_base_url | http://localhost:8001/api | Base of the analysis API. |
//! | app_url | http://localhost:3000 | Dashboard origin; login, upgrade and history links hang off it. |
//! | token_key | coldiq_token | Token store key holding the session token. |
//! | user_key | coldiq_user | Token store key holding the cached user profile (cleared with the token). |
//! | storage_path | ./data/coldiq_store | Sled directory for the persistent token store. |
//! | request_timeout_secs | 60 | HTTP timeout for one analysis call. |
//! | quiet_window_ms | 500 | Mutation debounce window. |
//! | initial_scan_delay_ms | 2000 | Unconditional re-scan after the watcher starts. |
//! | compose_shortcut_key | c | Host application's "compose" keyboard shortcut. |
//! | compose_shortcut_delay_ms | 1000 | Re-scan delay after the compose shortcut. |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime configuration for the mail agent and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub api_base_url: String,
    pub app_url: String,
    pub token_key: String,
    pub user_key: String,
    pub storage_path: String,
    pub request_timeout_secs: u64,
    pub quiet_window_ms: u64,
    pub initial_scan_delay_ms: u64,
    pub compose_shortcut_key: String,
    pub compose_shortcut_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8001/api".to_string(),
            app_url: "http://localhost:3000".to_string(),
            token_key: "coldiq_token".to_string(),
            user_key: "coldiq_user".to_string(),
            storage_path: "./data/coldiq_store".to_string(),
            request_timeout_secs: 60,
            quiet_window_ms: 500,
            initial_scan_delay_ms: 2000,
            compose_shortcut_key: "c".to_string(),
            compose_shortcut_delay_ms: 1000,
        }
    }
}

impl AgentConfig {
    /// Load config from file and environment. Precedence: `COLDIQ__*` env > file at
    /// `COLDIQ_CONFIG` (default `config/coldiq.toml`) > built-in defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("COLDIQ_CONFIG").unwrap_or_else(|_| "config/coldiq.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Same as [`AgentConfig::load`] with an explicit file path. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder();
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        builder
            .add_source(config::Environment::with_prefix("COLDIQ").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    pub fn initial_scan_delay(&self) -> Duration {
        Duration::from_millis(self.initial_scan_delay_ms)
    }

    pub fn compose_shortcut_delay(&self) -> Duration {
        Duration::from_millis(self.compose_shortcut_delay_ms)
    }

    /// Dashboard links rendered inside the result panel.
    pub fn links(&self) -> PanelLinks {
        PanelLinks::from_app_url(&self.app_url)
    }
}

/// Call-to-action targets shown by the result panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelLinks {
    pub login_url: String,
    pub upgrade_url: String,
    pub history_url: String,
}

impl PanelLinks {
    pub fn from_app_url(app_url: &str) -> Self {
        let base = app_url.trim_end_matches('/');
        Self {
            login_url: format!("{}/login", base),
            upgrade_url: format!("{}/pricing", base),
            history_url: format!("{}/history", base),
        }
    }
}

impl Default for PanelLinks {
    fn default() -> Self {
        AgentConfig::default().links()
    }
}
