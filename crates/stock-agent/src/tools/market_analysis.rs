//! Market analysis: technical indicators, trends and risk
//!
//! Everything here is pure computation over a [`StockSnapshot`]. Missing
//! fundamentals count as zero, which is the conservative reading for the
//! market-cap rule and the neutral one for beta and P/E.

use serde::{Deserialize, Serialize};
use ta::Next;
use ta::indicators::{ExponentialMovingAverage, RelativeStrengthIndex, SimpleMovingAverage};
use tracing::{debug, instrument};

use crate::error::{Result, StockError};
use crate::models::{CompanyProfile, StockSnapshot};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const SUPPORT_WINDOW: usize = 20;
const VOLUME_WINDOW: usize = 5;

/// Direction of price movement over a lookback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsiSignal {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiSignal {
    fn from_rsi(rsi: f64) -> Self {
        if rsi > 70.0 {
            Self::Overbought
        } else if rsi < 30.0 {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }
}

/// Three-step risk scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// low = 1, medium = 2, high = 3
    pub fn score(self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 2.0,
            Self::High => 3.0,
        }
    }

    fn for_market_cap(market_cap: f64) -> Self {
        if market_cap < 2e9 {
            Self::High
        } else if market_cap < 10e9 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    fn for_beta(beta: f64) -> Self {
        if beta > 1.5 {
            Self::High
        } else if beta > 1.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    fn for_pe(pe: f64) -> Self {
        if pe > 30.0 || pe < 0.0 {
            Self::High
        } else if pe > 20.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    fn for_sector(sector: Option<&str>) -> Self {
        match sector {
            Some("Healthcare" | "Consumer Defensive") => Self::Low,
            Some("Energy") => Self::High,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub sma_20: f64,
    pub sma_50: f64,
    /// Only with at least 200 points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_200: Option<f64>,
    pub rsi: f64,
    pub rsi_signal: RsiSignal,
    /// EMA(12) - EMA(26)
    pub macd: f64,
    /// EMA(9) of the MACD line
    pub macd_signal: f64,
    pub current_price: f64,
    /// Percent change against the previous close
    pub price_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub short_term_trend: Trend,
    pub medium_term_trend: Trend,
    pub long_term_trend: Trend,
    /// Annualised, as a fraction
    pub volatility: f64,
    pub volume_trend: VolumeTrend,
    pub support_level: f64,
    pub resistance_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub market_cap_risk: RiskLevel,
    pub beta_risk: RiskLevel,
    pub valuation_risk: RiskLevel,
    pub sector_risk: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Mean of the market-cap, beta and valuation scores, 1.0 to 3.0
    pub overall_risk_score: f64,
    pub risk_factors: RiskFactors,
    pub beta: Option<f64>,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub technical_indicators: TechnicalIndicators,
    pub trend_analysis: TrendAnalysis,
    pub risk_assessment: RiskAssessment,
}

/// Derives [`MarketAnalysis`] from a snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketAnalysisTool;

impl MarketAnalysisTool {
    pub const NAME: &'static str = "market_analysis";
    pub const DESCRIPTION: &'static str =
        "Compute technical indicators, trend and risk assessment from stock data";

    pub fn new() -> Self {
        Self
    }

    #[instrument(name = "market_analysis", skip(self, snapshot), fields(ticker = %snapshot.ticker))]
    pub fn run(&self, snapshot: &StockSnapshot) -> Result<MarketAnalysis> {
        let closes = snapshot.closes();
        if closes.is_empty() {
            return Err(StockError::IndicatorError(
                "Insufficient price data".to_string(),
            ));
        }

        let analysis = MarketAnalysis {
            technical_indicators: technical_indicators(&closes)?,
            trend_analysis: trend_analysis(&closes, &snapshot.volumes()),
            risk_assessment: risk_assessment(&snapshot.profile),
        };

        debug!(
            rsi = analysis.technical_indicators.rsi,
            risk = analysis.risk_assessment.overall_risk_score,
            "Market analysis complete"
        );
        Ok(analysis)
    }
}

fn indicator_error(e: impl std::fmt::Display) -> StockError {
    StockError::IndicatorError(e.to_string())
}

/// `closes` must be non-empty
fn technical_indicators(closes: &[f64]) -> Result<TechnicalIndicators> {
    let mut sma_20 = SimpleMovingAverage::new(20).map_err(indicator_error)?;
    let mut sma_50 = SimpleMovingAverage::new(50).map_err(indicator_error)?;
    let mut sma_200 = SimpleMovingAverage::new(200).map_err(indicator_error)?;
    let mut rsi = RelativeStrengthIndex::new(14).map_err(indicator_error)?;
    let mut ema_12 = ExponentialMovingAverage::new(12).map_err(indicator_error)?;
    let mut ema_26 = ExponentialMovingAverage::new(26).map_err(indicator_error)?;
    let mut signal = ExponentialMovingAverage::new(9).map_err(indicator_error)?;

    let mut last = (0.0, 0.0, 0.0, 50.0, 0.0, 0.0);
    for &close in closes {
        let macd = ema_12.next(close) - ema_26.next(close);
        last = (
            sma_20.next(close),
            sma_50.next(close),
            sma_200.next(close),
            rsi.next(close),
            macd,
            signal.next(macd),
        );
    }
    let (sma_20, sma_50, sma_200, rsi, macd, macd_signal) = last;
    let rsi = if rsi.is_finite() { rsi } else { 50.0 };

    let current_price = closes[closes.len() - 1];
    let price_change = match closes.len().checked_sub(2).map(|i| closes[i]) {
        Some(previous) if previous != 0.0 => (current_price / previous - 1.0) * 100.0,
        _ => 0.0,
    };

    Ok(TechnicalIndicators {
        sma_20,
        sma_50,
        sma_200: (closes.len() >= 200).then_some(sma_200),
        rsi,
        rsi_signal: RsiSignal::from_rsi(rsi),
        macd,
        macd_signal,
        current_price,
        price_change,
    })
}

/// Compare the latest close with the one `lookback` points earlier,
/// or with the oldest point when history is shorter
fn trend(closes: &[f64], lookback: usize) -> Trend {
    let latest = closes[closes.len() - 1];
    let reference = closes[closes.len().saturating_sub(lookback)];
    if latest > reference {
        Trend::Bullish
    } else {
        Trend::Bearish
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

/// `closes` must be non-empty
fn trend_analysis(closes: &[f64], volumes: &[f64]) -> TrendAnalysis {
    let squared_returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] / w[0] - 1.0).powi(2))
        .collect();
    let volatility = mean(&squared_returns).sqrt() * TRADING_DAYS_PER_YEAR.sqrt();

    let volume_trend = match volumes.last() {
        Some(&latest) if latest > mean(tail(volumes, VOLUME_WINDOW)) => VolumeTrend::Increasing,
        _ => VolumeTrend::Decreasing,
    };

    let recent = tail(closes, SUPPORT_WINDOW);
    TrendAnalysis {
        short_term_trend: trend(closes, 5),
        medium_term_trend: trend(closes, 20),
        long_term_trend: trend(closes, 50),
        volatility,
        volume_trend,
        support_level: recent.iter().copied().fold(f64::INFINITY, f64::min),
        resistance_level: recent.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

fn risk_assessment(profile: &CompanyProfile) -> RiskAssessment {
    let market_cap_risk = RiskLevel::for_market_cap(profile.market_cap.unwrap_or(0.0));
    let beta_risk = RiskLevel::for_beta(profile.beta.unwrap_or(0.0));
    let valuation_risk = RiskLevel::for_pe(profile.trailing_pe.unwrap_or(0.0));
    let sector_risk = RiskLevel::for_sector(profile.sector.as_deref());

    RiskAssessment {
        overall_risk_score: (market_cap_risk.score() + beta_risk.score() + valuation_risk.score())
            / 3.0,
        risk_factors: RiskFactors {
            market_cap_risk,
            beta_risk,
            valuation_risk,
            sector_risk,
        },
        beta: profile.beta,
        sector: profile.sector.clone(),
        market_cap: profile.market_cap,
    }
}
