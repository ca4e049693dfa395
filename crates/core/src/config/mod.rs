//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MINARET_*)
//! 2. TOML config file (if MINARET_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MINARET_*)
/// 2. TOML config file (if MINARET_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the controlled application is served from. Relative request
    /// URLs and manifest entries are resolved against it.
    ///
    /// Set via MINARET_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix shared by every cache store name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Generation tag embedded in the store names. Bump it whenever the
    /// precache manifest changes.
    ///
    /// Set via MINARET_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Assets fetched into the static store at install time, in order.
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// Request paths starting with this prefix are network-first.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Endpoint refreshed by the prayer-time sync triggers.
    #[serde(default = "default_prayer_times_url")]
    pub prayer_times_url: String,

    /// Path to SQLite cache database, or `:memory:`.
    ///
    /// Set via MINARET_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to read per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Delay before a snoozed notification is shown again.
    #[serde(default = "default_snooze_secs")]
    pub snooze_secs: u64,

    /// Title used when a push arrives without a payload.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    /// Body used when a push arrives without a payload.
    #[serde(default = "default_notification_body")]
    pub notification_body: String,

    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    #[serde(default = "default_notification_badge")]
    pub notification_badge: String,
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_cache_prefix() -> String {
    "minaret".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_precache_urls() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/static/js/main.js",
        "/static/css/main.css",
        "/manifest.json",
        "/favicon.ico",
        "/logo192.png",
        "/logo512.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_prayer_times_url() -> String {
    "/api/prayer-times".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./minaret-cache.sqlite")
}

fn default_user_agent() -> String {
    "minaret/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_snooze_secs() -> u64 {
    300
}

fn default_notification_title() -> String {
    "Prayer Reminder".into()
}

fn default_notification_body() -> String {
    "It is almost time for prayer".into()
}

fn default_notification_icon() -> String {
    "/logo192.png".into()
}

fn default_notification_badge() -> String {
    "/favicon.ico".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            precache_urls: default_precache_urls(),
            api_prefix: default_api_prefix(),
            prayer_times_url: default_prayer_times_url(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            snooze_secs: default_snooze_secs(),
            notification_title: default_notification_title(),
            notification_body: default_notification_body(),
            notification_icon: default_notification_icon(),
            notification_badge: default_notification_badge(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn snooze_delay(&self) -> Duration {
        Duration::from_secs(self.snooze_secs)
    }

    /// Name of the current generation's static store.
    pub fn static_cache_name(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.cache_version)
    }

    /// Name of the current generation's dynamic store.
    pub fn dynamic_cache_name(&self) -> String {
        format!("{}-dynamic-{}", self.cache_prefix, self.cache_version)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {scheme}") }),
        }
    }

    /// Whether the database lives only in memory.
    pub fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == ":memory:"
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MINARET_`
    /// 2. TOML file from `MINARET_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MINARET_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MINARET_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
