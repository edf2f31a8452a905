//! Tool for retrieving company profile and price history

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::api::MarketDataProvider;
use crate::cache::{CacheKey, StockCache};
use crate::error::{Result, StockError};
use crate::models::StockSnapshot;

/// Fetches everything the analysis needs for one ticker
pub struct StockDataTool {
    provider: Arc<dyn MarketDataProvider>,
    cache: StockCache<StockSnapshot>,
}

impl StockDataTool {
    pub const NAME: &'static str = "stock_data_retrieval";
    pub const DESCRIPTION: &'static str =
        "Retrieve company profile and one year of daily prices for a ticker";

    /// Create a new stock data tool
    pub fn new(provider: Arc<dyn MarketDataProvider>, cache: StockCache<StockSnapshot>) -> Self {
        Self { provider, cache }
    }

    /// Snapshot for `ticker`, served from cache while fresh
    #[instrument(name = "stock_data_retrieval", skip(self))]
    pub async fn run(&self, ticker: &str) -> Result<StockSnapshot> {
        self.cache
            .get_or_fetch(CacheKey::new(ticker, Self::NAME), || self.fetch(ticker))
            .await
    }

    async fn fetch(&self, ticker: &str) -> Result<StockSnapshot> {
        let (profile, history) = tokio::join!(
            self.provider.company_profile(ticker),
            self.provider.price_history(ticker),
        );

        let history = history?;
        if history.is_empty() {
            return Err(StockError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "No historical data available".to_string(),
            });
        }

        // Fundamentals are optional for the analysis, prices are not
        let profile = profile.unwrap_or_else(|e| {
            warn!(provider = self.provider.name(), error = %e, "Company profile unavailable");
            Default::default()
        });

        info!(points = history.len(), "Retrieved stock data");

        Ok(StockSnapshot {
            ticker: ticker.to_string(),
            profile,
            history,
        })
    }
}
