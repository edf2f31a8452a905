//! Tools the recommendation agent runs, in order
//!
//! - [`TickerLookupTool`]: company name to ticker
//! - [`StockDataTool`]: profile and price history for a ticker
//! - [`MarketAnalysisTool`]: technical, trend and risk figures from the data

pub mod market_analysis;
pub mod stock_data;
pub mod ticker_lookup;

pub use market_analysis::{
    MarketAnalysis, MarketAnalysisTool, RiskAssessment, RiskLevel, TechnicalIndicators, Trend,
    TrendAnalysis,
};
pub use stock_data::StockDataTool;
pub use ticker_lookup::TickerLookupTool;
