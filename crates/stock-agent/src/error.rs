//! Error types for stock recommendation operations

use thiserror::Error;

/// Stock recommendation specific errors
#[derive(Debug, Error)]
pub enum StockError {
    /// Request carried neither a ticker nor a company name
    #[error("Please provide either a ticker or stock name")]
    MissingQuery,

    /// Invalid stock symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Company name search returned no quotes
    #[error("Could not find ticker for '{0}'")]
    TickerNotFound(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Upstream answered with a non-success status
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance rejected or could not serve the request
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Yahoo Finance did not answer; worth another attempt
    #[error("Yahoo Finance unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream call did not finish in time
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    IndicatorError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(#[from] agent_llm::LLMError),

    /// Prompt rendering error
    #[error("Prompt error: {0}")]
    Prompt(#[from] agent_prompt::PromptError),

    /// LLM answered with something that is not a usable recommendation
    #[error("Invalid LLM response: {0}")]
    InvalidLlmResponse(String),
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

impl StockError {
    /// Errors caused by the request itself; reported to callers as 400
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingQuery | Self::InvalidSymbol(_) | Self::TickerNotFound(_)
        )
    }

    /// Errors worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
            Self::RateLimitExceeded { .. } | Self::UpstreamUnavailable(_) | Self::Timeout(_) => {
                true
            }
            Self::Llm(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<agent_utils::ConfigError> for StockError {
    fn from(err: agent_utils::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
