//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_prefix` or `cache_version` is empty
    /// - `precache_urls` is empty
    /// - `api_prefix` does not start with `/`
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `snooze_secs` is 0
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.cache_version.is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }

        if self.precache_urls.is_empty() {
            return Err(invalid("precache_urls", "must list at least the root document"));
        }
        if !self.precache_urls.iter().any(|u| u == "/") {
            tracing::warn!(
                count = self.precache_urls.len(),
                "precache_urls does not include \"/\"; navigations will have no offline fallback"
            );
        }

        if !self.api_prefix.starts_with('/') {
            return Err(invalid("api_prefix", "must start with '/'"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.snooze_secs == 0 {
            return Err(invalid("snooze_secs", "must be greater than 0"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: Result<(), ConfigError>) -> Option<String> {
        match result {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("origin"));
    }

    #[test]
    fn test_validate_empty_version() {
        let config = AppConfig { cache_version: String::new(), ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("cache_version"));
    }

    #[test]
    fn test_validate_empty_manifest() {
        let config = AppConfig { precache_urls: Vec::new(), ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("precache_urls"));
    }

    #[test]
    fn test_validate_manifest_without_root_is_allowed() {
        let config = AppConfig { precache_urls: vec!["/app.js".into()], ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_api_prefix_must_be_absolute() {
        let config = AppConfig { api_prefix: "api/".into(), ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("api_prefix"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("timeout_ms"));

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("timeout_ms"));

        let config = AppConfig { timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes_bounds() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("max_bytes"));

        let config = AppConfig { max_bytes: 50 * 1024 * 1024, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_snooze() {
        let config = AppConfig { snooze_secs: 0, ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("snooze_secs"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert_eq!(field_of(config.validate()).as_deref(), Some("user_agent"));
    }
}
