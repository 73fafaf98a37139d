//! Gateway Configuration
//!
//! One immutable [`GatewayConfig`] is resolved at startup from three layers,
//! later layers overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. an optional config file (TOML, YAML or JSON, chosen by extension)
//! 3. environment variables (`OPENWEBUI_URL`, `AGENT_WHITELIST`, ...)
//!
//! Call [`load_environment`] first so a local `.env` file is visible to layer 3.
//!
//! ```rust,ignore
//! use owui_core::config::{load_environment, GatewayConfig};
//!
//! load_environment();
//! let config = GatewayConfig::load(None)?;
//! ```

use crate::error::ConfigError;
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_OPENWEBUI_URL: &str = "http://localhost:3000";

/// Load variables from `.env` in the working directory (or a parent).
///
/// Existing environment variables are NOT overridden.
/// Returns the path that was loaded, or None if no file was found.
pub fn load_environment() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            info!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) => {
            debug!("No .env file loaded: {}", e);
            None
        }
    }
}

/// Fully resolved gateway configuration
#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    /// OpenWebUI base URL
    #[serde(default = "default_openwebui_url")]
    pub openwebui_url: String,

    /// Bearer credential for the OpenWebUI API
    #[serde(default)]
    pub openwebui_api_key: String,

    /// Agent id patterns to allow (empty = all)
    #[serde(default, deserialize_with = "pattern_list")]
    pub agent_whitelist: Vec<String>,

    /// Agent id patterns to deny (wins over the whitelist)
    #[serde(default, deserialize_with = "pattern_list")]
    pub agent_blacklist: Vec<String>,

    /// Catalog cache time-to-live
    #[serde(default = "default_cache_duration")]
    pub cache_duration_seconds: u64,

    /// Deadline for the model listing call
    #[serde(default = "default_models_timeout")]
    pub models_timeout_seconds: u64,

    /// Deadline for a chat completion call
    #[serde(default = "default_completion_timeout")]
    pub completion_timeout_seconds: u64,

    /// Retry a completion once on timeout / network failure
    #[serde(default)]
    pub retry_transient: bool,

    /// Only expose OpenWebUI workspace models (records with an `info` block)
    #[serde(default = "default_true")]
    pub workspace_only: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// A pattern list is either a sequence (config file) or one comma-separated
/// string (environment).
fn pattern_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Patterns {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match Patterns::deserialize(deserializer)? {
        Patterns::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        Patterns::List(list) => list,
    })
}

fn default_openwebui_url() -> String {
    DEFAULT_OPENWEBUI_URL.to_string()
}

fn default_cache_duration() -> u64 {
    600
}

fn default_models_timeout() -> u64 {
    30
}

fn default_completion_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            openwebui_url: default_openwebui_url(),
            openwebui_api_key: String::new(),
            agent_whitelist: vec![],
            agent_blacklist: vec![],
            cache_duration_seconds: default_cache_duration(),
            models_timeout_seconds: default_models_timeout(),
            completion_timeout_seconds: default_completion_timeout(),
            retry_transient: false,
            workspace_only: true,
            log_level: default_log_level(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("openwebui_url", &self.openwebui_url)
            .field("openwebui_api_key", &self.redacted_api_key())
            .field("agent_whitelist", &self.agent_whitelist)
            .field("agent_blacklist", &self.agent_blacklist)
            .field("cache_duration_seconds", &self.cache_duration_seconds)
            .field("models_timeout_seconds", &self.models_timeout_seconds)
            .field("completion_timeout_seconds", &self.completion_timeout_seconds)
            .field("retry_transient", &self.retry_transient)
            .field("workspace_only", &self.workspace_only)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl GatewayConfig {
    /// Resolve configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder.add_source(Self::environment()).build()?;
        Self::from_settings(settings)
    }

    /// Environment source: plain upper-case names.
    ///
    /// Values stay strings here. Typed fields convert while deserializing, so
    /// a key like `0012345` is never reparsed as a number.
    pub(crate) fn environment() -> Environment {
        Environment::default().ignore_empty(true)
    }

    /// Deserialize, normalize and validate already-layered settings
    pub fn from_settings(settings: Config) -> Result<Self, ConfigError> {
        let mut config: Self = settings.try_deserialize()?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        self.openwebui_url = self.openwebui_url.trim().trim_end_matches('/').to_string();
        self.openwebui_api_key = self.openwebui_api_key.trim().to_string();
        for list in [&mut self.agent_whitelist, &mut self.agent_blacklist] {
            *list = list
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
        self.log_level = self.log_level.trim().to_lowercase();
    }

    /// Check invariants the rest of the gateway relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.openwebui_url).map_err(|e| {
            ConfigError::Invalid(format!("openwebui_url '{}': {}", self.openwebui_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "openwebui_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.cache_duration_seconds == 0 {
            return Err(ConfigError::Invalid("cache_duration_seconds must be > 0".into()));
        }
        if self.models_timeout_seconds == 0 || self.completion_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("upstream timeouts must be > 0".into()));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_duration_seconds)
    }

    pub fn models_timeout(&self) -> Duration {
        Duration::from_secs(self.models_timeout_seconds)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_seconds)
    }

    pub fn has_api_key(&self) -> bool {
        !self.openwebui_api_key.is_empty()
    }

    /// API key safe for logs: first 10 characters only
    pub fn redacted_api_key(&self) -> String {
        if self.openwebui_api_key.is_empty() {
            return "None".to_string();
        }
        let prefix: String = self.openwebui_api_key.chars().take(10).collect();
        format!("{}...", prefix)
    }
}
