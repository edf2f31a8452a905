//! Tool for converting a company name to a ticker symbol

use std::sync::Arc;
use tracing::{info, instrument};

use crate::api::MarketDataProvider;
use crate::cache::{CacheKey, StockCache};
use crate::error::{Result, StockError};
use crate::models::normalize_ticker;

/// Resolves names like "Apple" to symbols like "AAPL"
pub struct TickerLookupTool {
    provider: Arc<dyn MarketDataProvider>,
    cache: StockCache<String>,
}

impl TickerLookupTool {
    pub const NAME: &'static str = "stock_name_to_ticker";
    pub const DESCRIPTION: &'static str = "Convert company name to stock ticker symbol";

    pub fn new(provider: Arc<dyn MarketDataProvider>, cache: StockCache<String>) -> Self {
        Self { provider, cache }
    }

    /// Ticker of the best search match for `name`
    #[instrument(name = "stock_name_to_ticker", skip(self))]
    pub async fn run(&self, name: &str) -> Result<String> {
        let key = CacheKey::new(name.trim().to_lowercase(), Self::NAME);

        let ticker = self
            .cache
            .get_or_fetch(key, || async {
                let symbol = self
                    .provider
                    .search_symbol(name)
                    .await?
                    .ok_or_else(|| StockError::TickerNotFound(name.to_string()))?;
                normalize_ticker(&symbol)
            })
            .await?;

        info!(%ticker, "Found ticker for company");
        Ok(ticker)
    }
}
