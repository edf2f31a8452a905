//! Market data access
//!
//! [`MarketDataProvider`] is the seam between the tools and the network.
//! [`YahooFinanceClient`] is the production implementation.

pub mod retry;
pub mod yahoo;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CompanyProfile, PricePoint};

pub use retry::RetryPolicy;
pub use yahoo::YahooFinanceClient;

/// Source of quotes, fundamentals and symbol search
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Best matching ticker for a company name, `None` when nothing matches
    async fn search_symbol(&self, query: &str) -> Result<Option<String>>;

    /// Daily bars for the configured history range, oldest first
    async fn price_history(&self, symbol: &str) -> Result<Vec<PricePoint>>;

    /// Company fundamentals
    async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile>;

    /// Provider name for logs
    fn name(&self) -> &str;
}
