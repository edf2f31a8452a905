//! Domain types shared by the tools, the agent and the HTTP layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StockError};
use crate::tools::market_analysis::MarketAnalysis;

const MAX_TICKER_LEN: usize = 15;

/// What the caller asked about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockQuery {
    /// An exchange symbol such as `AAPL` or `BRK-B`
    Ticker(String),
    /// A company name to resolve through search
    Name(String),
}

impl StockQuery {
    /// Build a query from the optional `ticker` and `stock` parameters
    ///
    /// Blank values count as absent. A ticker wins over a name.
    pub fn from_params(ticker: Option<&str>, stock: Option<&str>) -> Result<Self> {
        let ticker = ticker.map(str::trim).filter(|t| !t.is_empty());
        let stock = stock.map(str::trim).filter(|s| !s.is_empty());

        match (ticker, stock) {
            (Some(ticker), _) => Ok(Self::Ticker(normalize_ticker(ticker)?)),
            (None, Some(name)) => Ok(Self::Name(name.to_string())),
            (None, None) => Err(StockError::MissingQuery),
        }
    }
}

/// Upper-case and validate a ticker symbol
pub fn normalize_ticker(raw: &str) -> Result<String> {
    let ticker = raw.trim().to_uppercase();

    let valid_chars = ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));

    if ticker.is_empty() || ticker.len() > MAX_TICKER_LEN || !valid_chars {
        return Err(StockError::InvalidSymbol(raw.to_string()));
    }

    Ok(ticker)
}

/// One daily bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adjclose: f64,
}

/// Company fundamentals; Yahoo omits fields freely, so all are optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub long_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
}

/// Everything fetched for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub ticker: String,
    pub profile: CompanyProfile,
    pub history: Vec<PricePoint>,
}

impl StockSnapshot {
    /// Closing prices, oldest first
    pub fn closes(&self) -> Vec<f64> {
        self.history.iter().map(|p| p.close).collect()
    }

    /// Daily volumes, oldest first
    #[allow(clippy::cast_precision_loss)]
    pub fn volumes(&self) -> Vec<f64> {
        self.history.iter().map(|p| p.volume as f64).collect()
    }
}

/// Buy/Hold/Sell verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Buy,
    Hold,
    Sell,
}

impl Recommendation {
    /// Parse a model verdict (`"buy"`, `"Strong Buy"`, `"HOLD"`)
    ///
    /// The whole value must be one verdict; anything qualified such as
    /// `"Sell - do not buy"` is rejected rather than guessed at.
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        let verdict = lower.strip_prefix("strong").map_or(lower.as_str(), str::trim_start);
        match verdict {
            "buy" => Some(Self::Buy),
            "hold" => Some(Self::Hold),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }
}

/// The response body of `GET /stock`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRecommendation {
    pub ticker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub recommendation: Recommendation,
    /// 0 to 100
    pub confidence_score: f64,
    pub key_insights: Vec<String>,
    pub risk_assessment: Value,
    pub price_target: Option<Value>,
    pub market_analysis: MarketAnalysis,
    pub generated_at: DateTime<Utc>,
}
