//! Stock market recommendation service
//!
//! Answers `GET /stock?ticker=<SYMBOL>` or `GET /stock?stock=<NAME>` with a
//! Buy/Hold/Sell recommendation. A request flows through:
//!
//! - [`tools::TickerLookupTool`]: company name to ticker via Yahoo search
//! - [`tools::StockDataTool`]: profile and one year of daily prices
//! - [`tools::MarketAnalysisTool`]: moving averages, RSI, MACD, trend and risk
//! - [`agents::StockRecommendationAgent`]: LLM call in JSON mode
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_llm::providers::OpenAIProvider;
//! use stock_agent::{AppState, ServerConfig, StockConfig, StockRecommendationAgent, server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let llm = Arc::new(OpenAIProvider::from_env()?);
//!     let agent = StockRecommendationAgent::from_config(StockConfig::from_env()?, llm)?;
//!     server::serve(&ServerConfig::default(), AppState::new(agent)).await?;
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod prompts;
pub mod server;
pub mod tools;

pub use agents::StockRecommendationAgent;
pub use api::{MarketDataProvider, RetryPolicy, YahooFinanceClient};
pub use cache::{CacheKey, CacheManager, StockCache};
pub use config::{StockConfig, StockConfigBuilder};
pub use error::{Result, StockError};
pub use models::{
    CompanyProfile, PricePoint, Recommendation, StockQuery, StockRecommendation, StockSnapshot,
};
pub use server::{AppState, ServerConfig, create_router};
pub use tools::{MarketAnalysis, MarketAnalysisTool, StockDataTool, TickerLookupTool};
