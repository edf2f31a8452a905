//! Configuration for the stock recommendation service

use crate::error::{Result, StockError};
use agent_utils::{env_or, env_parse};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ranges accepted by the Yahoo chart endpoint
pub const HISTORY_RANGES: &[&str] = &[
    "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];

/// Configuration for data retrieval and recommendation generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// Cache TTL for price history snapshots
    pub cache_ttl_realtime: Duration,

    /// Cache TTL for company name to ticker lookups
    pub cache_ttl_search: Duration,

    /// Attempts per upstream call, the first one included
    pub max_attempts: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Yahoo requests allowed per minute
    pub rate_limit_per_minute: u32,

    /// How much daily history to fetch (`1y` by default)
    pub history_range: String,

    /// Base URL for Yahoo search and quote summary endpoints
    pub yahoo_api_base: String,

    /// Chat model used for recommendations
    pub model: String,

    /// Sampling temperature for the recommendation model
    pub temperature: f32,

    /// Upper bound on generated tokens
    pub max_tokens: usize,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            cache_ttl_realtime: Duration::from_secs(60),
            cache_ttl_search: Duration::from_secs(3600),
            max_attempts: 3,
            retry_backoff_base: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            rate_limit_per_minute: 60,
            history_range: "1y".to_string(),
            yahoo_api_base: "https://query2.finance.yahoo.com".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Read overrides from the environment, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Self::builder()
            .cache_ttl_realtime(Duration::from_secs(env_parse(
                "CACHE_TTL_REALTIME_SECS",
                defaults.cache_ttl_realtime.as_secs(),
            )?))
            .cache_ttl_search(Duration::from_secs(env_parse(
                "CACHE_TTL_SEARCH_SECS",
                defaults.cache_ttl_search.as_secs(),
            )?))
            .max_attempts(env_parse("MAX_ATTEMPTS", defaults.max_attempts)?)
            .retry_backoff_base(Duration::from_millis(env_parse(
                "RETRY_BACKOFF_MS",
                1000_u64,
            )?))
            .request_timeout(Duration::from_secs(env_parse(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?))
            .rate_limit_per_minute(env_parse(
                "YAHOO_RATE_LIMIT_PER_MINUTE",
                defaults.rate_limit_per_minute,
            )?)
            .history_range(env_or("HISTORY_RANGE", &defaults.history_range))
            .yahoo_api_base(env_or("YAHOO_API_BASE", &defaults.yahoo_api_base))
            .model(env_or("OPENAI_MODEL", &defaults.model))
            .temperature(env_parse("OPENAI_TEMPERATURE", defaults.temperature)?)
            .max_tokens(env_parse("OPENAI_MAX_TOKENS", defaults.max_tokens)?)
            .build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(StockError::ConfigError(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_per_minute == 0 {
            return Err(StockError::ConfigError(
                "rate_limit_per_minute must be greater than 0".to_string(),
            ));
        }

        if !HISTORY_RANGES.contains(&self.history_range.as_str()) {
            return Err(StockError::ConfigError(format!(
                "history_range '{}' is not one of {HISTORY_RANGES:?}",
                self.history_range
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(StockError::ConfigError(format!(
                "temperature {} must be within 0.0..=2.0",
                self.temperature
            )));
        }

        url::Url::parse(&self.yahoo_api_base).map_err(|e| {
            StockError::ConfigError(format!("yahoo_api_base is not a valid URL: {e}"))
        })?;

        Ok(())
    }

}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    cache_ttl_realtime: Option<Duration>,
    cache_ttl_search: Option<Duration>,
    max_attempts: Option<u32>,
    retry_backoff_base: Option<Duration>,
    request_timeout: Option<Duration>,
    rate_limit_per_minute: Option<u32>,
    history_range: Option<String>,
    yahoo_api_base: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl StockConfigBuilder {
    /// Set cache TTL for price history snapshots
    pub fn cache_ttl_realtime(mut self, duration: Duration) -> Self {
        self.cache_ttl_realtime = Some(duration);
        self
    }

    /// Set cache TTL for name lookups
    pub fn cache_ttl_search(mut self, duration: Duration) -> Self {
        self.cache_ttl_search = Some(duration);
        self
    }

    /// Set attempts per upstream call
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set retry backoff base duration
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    pub fn rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.rate_limit_per_minute = Some(limit);
        self
    }

    pub fn history_range(mut self, range: impl Into<String>) -> Self {
        self.history_range = Some(range.into());
        self
    }

    pub fn yahoo_api_base(mut self, base: impl Into<String>) -> Self {
        self.yahoo_api_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    /// Set the chat model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            cache_ttl_realtime: self.cache_ttl_realtime.unwrap_or(defaults.cache_ttl_realtime),
            cache_ttl_search: self.cache_ttl_search.unwrap_or(defaults.cache_ttl_search),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            retry_backoff_base: self.retry_backoff_base.unwrap_or(defaults.retry_backoff_base),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            rate_limit_per_minute: self
                .rate_limit_per_minute
                .unwrap_or(defaults.rate_limit_per_minute),
            history_range: self.history_range.unwrap_or(defaults.history_range),
            yahoo_api_base: self.yahoo_api_base.unwrap_or(defaults.yahoo_api_base),
            model: self.model.unwrap_or(defaults.model),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StockConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.model, "gpt-4o");
        assert!((config.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.history_range, "1y");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StockConfig::builder()
            .max_attempts(5)
            .request_timeout(Duration::from_secs(60))
            .yahoo_api_base("http://127.0.0.1:9999/")
            .build()
            .unwrap();

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.yahoo_api_base, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        assert!(StockConfig::builder().max_attempts(0).build().is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_range() {
        let err = StockConfig::builder().history_range("3d").build().unwrap_err();
        assert!(matches!(err, StockError::ConfigError(_)));
    }

    #[test]
    fn test_validation_rejects_temperature_out_of_range() {
        assert!(StockConfig::builder().temperature(2.5).build().is_err());
        assert!(StockConfig::builder().temperature(-0.1).build().is_err());
    }
}
