use serde::Deserialize;
use std::time::Duration;

use crate::error::CacheError;

/// Default upper bound on entry lifetime: five minutes.
pub const DEFAULT_MAX_EXPIRY_SECS: u64 = 300;

/// Default sweep interval for reclaiming expired entries.
pub const DEFAULT_REFRESH_TIME_SECS: u64 = 5;

/// Configuration for the caching middleware.
///
/// The struct deserializes from any serde-compatible source (JSON, YAML,
/// TOML) using camelCase field names, with every field optional:
///
/// ```
/// use tower_ram_cache::config::CacheConfig;
///
/// let config: CacheConfig =
///     serde_json::from_str(r#"{"maxExpiry": 60, "cacheQueryParams": true}"#).unwrap();
/// assert!(config.validate().is_ok());
/// ```
///
/// It can also be built in code via [`CacheConfig::new`] and the `with_*`
/// helpers. Configuration is immutable once handed to the layer; validation
/// happens at layer construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    max_expiry: u64,
    refresh_time: u64,
    add_status_header: bool,
    cache_query_params: bool,
    force_no_cache_header: bool,
    blacklisted_headers: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_expiry: DEFAULT_MAX_EXPIRY_SECS,
            refresh_time: DEFAULT_REFRESH_TIME_SECS,
            add_status_header: true,
            cache_query_params: false,
            force_no_cache_header: false,
            blacklisted_headers: Vec::new(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum entry lifetime in seconds. Must be greater than 1.
    pub fn with_max_expiry(mut self, seconds: u64) -> Self {
        self.max_expiry = seconds;
        self
    }

    /// Sets the expired-entry sweep interval in seconds.
    pub fn with_refresh_time(mut self, seconds: u64) -> Self {
        self.refresh_time = seconds;
        self
    }

    /// Emits a `Cache-Status` header (`hit`/`miss`/`error`) on responses.
    pub fn with_add_status_header(mut self, enabled: bool) -> Self {
        self.add_status_header = enabled;
        self
    }

    /// Includes the raw query string in cache keys.
    pub fn with_cache_query_params(mut self, enabled: bool) -> Self {
        self.cache_query_params = enabled;
        self
    }

    /// Forces `Cache-Control: no-cache` on replayed responses.
    pub fn with_force_no_cache_header(mut self, enabled: bool) -> Self {
        self.force_no_cache_header = enabled;
        self
    }

    /// Requests carrying any of these headers with a non-empty value bypass
    /// the cache entirely.
    pub fn with_blacklisted_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklisted_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Checks the configuration for values the middleware cannot run with.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_expiry <= 1 {
            return Err(CacheError::Config(
                "maxExpiry must be greater than 1".into(),
            ));
        }
        Ok(())
    }

    pub fn max_expiry(&self) -> Duration {
        Duration::from_secs(self.max_expiry)
    }

    /// Sweep interval; a configured zero falls back to the default.
    pub fn refresh_time(&self) -> Duration {
        if self.refresh_time == 0 {
            Duration::from_secs(DEFAULT_REFRESH_TIME_SECS)
        } else {
            Duration::from_secs(self.refresh_time)
        }
    }

    pub fn add_status_header(&self) -> bool {
        self.add_status_header
    }

    pub fn cache_query_params(&self) -> bool {
        self.cache_query_params
    }

    pub fn force_no_cache_header(&self) -> bool {
        self.force_no_cache_header
    }

    pub fn blacklisted_headers(&self) -> &[String] {
        &self.blacklisted_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_create_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_expiry(), Duration::from_secs(300));
        assert_eq!(config.refresh_time(), Duration::from_secs(5));
        assert!(config.add_status_header());
        assert!(!config.cache_query_params());
        assert!(!config.force_no_cache_header());
        assert!(config.blacklisted_headers().is_empty());
    }

    #[test]
    fn validate_rejects_low_max_expiry() {
        assert!(CacheConfig::new().with_max_expiry(0).validate().is_err());
        assert!(CacheConfig::new().with_max_expiry(1).validate().is_err());
        assert!(CacheConfig::new().with_max_expiry(2).validate().is_ok());
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let config: CacheConfig = serde_json::from_str(
            r#"{
                "maxExpiry": 10,
                "forceNoCacheHeader": true,
                "blacklistedHeaders": ["X-Internal-Auth"]
            }"#,
        )
        .expect("config deserializes");

        assert_eq!(config.max_expiry(), Duration::from_secs(10));
        assert_eq!(config.refresh_time(), Duration::from_secs(5));
        assert!(config.add_status_header());
        assert!(config.force_no_cache_header());
        assert_eq!(config.blacklisted_headers(), ["X-Internal-Auth"]);
    }

    #[test]
    fn zero_refresh_time_falls_back_to_default() {
        let config = CacheConfig::new().with_refresh_time(0);
        assert_eq!(config.refresh_time(), Duration::from_secs(5));
    }
}
