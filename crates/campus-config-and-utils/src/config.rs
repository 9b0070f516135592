//! Configuration for the hosted database connection and local tooling.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://campus.supabase.co",
};

/// Default Supabase anon key (can be overridden at compile time via SUPABASE_ANON_KEY env var).
pub const DEFAULT_SUPABASE_ANON_KEY: &str = match option_env!("SUPABASE_ANON_KEY") {
    Some(key) => key,
    None => "anon-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default HTTP request timeout for table operations.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Realtime connection tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Base reconnect delay in seconds.
    pub reconnect_base_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub reconnect_max_delay_secs: u64,
    /// Maximum reconnect attempts before the subscription gives up.
    pub max_reconnect_attempts: u32,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 30,
            reconnect_base_delay_secs: 1,
            reconnect_max_delay_secs: 30,
            max_reconnect_attempts: 10,
        }
    }
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase anon API key (public, safe to expose).
    #[serde(default = "default_supabase_anon_key")]
    pub supabase_anon_key: String,
    /// User access token. Falls back to the anon key when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Timeout for a single table request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Realtime connection tuning.
    #[serde(default)]
    pub realtime: RealtimeSettings,
    /// Also append JSONL logs under the logs directory.
    #[serde(default)]
    pub log_to_file: bool,
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_anon_key() -> String {
    DEFAULT_SUPABASE_ANON_KEY.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            supabase_url: DEFAULT_SUPABASE_URL.to_string(),
            supabase_anon_key: DEFAULT_SUPABASE_ANON_KEY.to_string(),
            access_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            realtime: RealtimeSettings::default(),
            log_to_file: false,
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override configuration from process environment variables.
    fn load_from_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Apply `CAMPUS_*` overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).and_then(non_empty);

        if let Some(level) = lookup("CAMPUS_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = lookup("CAMPUS_SUPABASE_URL") {
            self.supabase_url = url;
        }
        if let Some(key) = lookup("CAMPUS_SUPABASE_ANON_KEY") {
            self.supabase_anon_key = key;
        }
        if let Some(token) = lookup("CAMPUS_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(flag) = lookup("CAMPUS_LOG_FILE") {
            self.log_to_file = matches!(flag.as_str(), "1" | "true" | "yes");
        }
    }

    /// Reject settings that cannot produce a working connection.
    pub fn validate(&self) -> CoreResult<()> {
        let url = self.supabase_url()?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(CoreError::Config(format!(
                "supabase_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.supabase_anon_key.trim().is_empty() {
            return Err(CoreError::Config("supabase_anon_key is empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }

    /// Token sent as `Authorization: Bearer`.
    pub fn bearer_token(&self) -> &str {
        self.access_token
            .as_deref()
            .unwrap_or(&self.supabase_anon_key)
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
