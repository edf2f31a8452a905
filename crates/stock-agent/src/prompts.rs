//! Prompt text for the recommendation step

use agent_prompt::{JinjaTemplate, PromptBuilder};
use serde::Serialize;

use crate::error::Result;
use crate::models::StockSnapshot;
use crate::tools::MarketAnalysis;

/// Rows of recent history included in the prompt
const RECENT_ROWS: usize = 10;

const RECOMMENDATION_TEMPLATE: &str = r"As a senior financial analyst, provide a comprehensive stock recommendation for {{ ticker }}{% if profile.long_name %} ({{ profile.long_name }}){% endif %}.

Stock Data:
- Sector: {{ profile.sector or 'N/A' }}
- Industry: {{ profile.industry or 'N/A' }}
- Market cap: {{ profile.market_cap or 0 }}
- Trailing P/E: {{ profile.trailing_pe or 0 }}
- Dividend yield: {{ profile.dividend_yield or 0 }}
- Beta: {{ profile.beta or 'N/A' }}
- Price points: {{ points }} daily closes from {{ first_date }} to {{ last_date }}
- Change over the period: {{ period_change | pct }}
- Recent closes:
{% for row in recent %}  {{ row.date }}: {{ row.close | fixed(2) }} (volume {{ row.volume }})
{% endfor %}
Market Analysis:
{{ analysis_json }}

Generate a JSON response with:
- recommendation (Buy/Hold/Sell)
- confidence_score
- key_insights
- risk_assessment
- price_target";

#[derive(Serialize)]
struct RecentRow {
    date: String,
    close: f64,
    volume: u64,
}

#[derive(Serialize)]
struct RecommendationContext<'a> {
    ticker: &'a str,
    profile: &'a crate::models::CompanyProfile,
    points: usize,
    first_date: String,
    last_date: String,
    period_change: f64,
    recent: Vec<RecentRow>,
    analysis_json: String,
}

/// Builds the system and user messages for the recommendation call
#[derive(Debug)]
pub struct RecommendationPrompt {
    template: JinjaTemplate,
}

impl RecommendationPrompt {
    pub fn new() -> Result<Self> {
        Ok(Self {
            template: JinjaTemplate::new("stock_recommendation", RECOMMENDATION_TEMPLATE)?,
        })
    }

    /// System prompt pinning the response shape
    pub fn system(&self) -> String {
        PromptBuilder::new()
            .text("You are a financial analyst providing detailed stock recommendations in JSON format.")
            .section("Response format")
            .text("Respond with a single JSON object and nothing else. Keys:")
            .newline()
            .bullets([
                r#"recommendation: one of "Buy", "Hold", "Sell""#,
                "confidence_score: number from 0 to 100",
                "key_insights: array of short strings",
                "risk_assessment: object or string summarising the main risks",
                "price_target: number or object with a target price and horizon",
            ])
            .build()
    }

    /// User prompt carrying the data and analysis
    pub fn render(&self, snapshot: &StockSnapshot, analysis: &MarketAnalysis) -> Result<String> {
        let date = |i: usize| {
            snapshot
                .history
                .get(i)
                .map(|p| p.timestamp.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        let len = snapshot.history.len();
        let period_change = match (snapshot.history.first(), snapshot.history.last()) {
            (Some(first), Some(last)) if first.close > 0.0 => (last.close / first.close - 1.0) * 100.0,
            _ => 0.0,
        };

        let context = RecommendationContext {
            ticker: &snapshot.ticker,
            profile: &snapshot.profile,
            points: len,
            first_date: date(0),
            last_date: date(len.saturating_sub(1)),
            period_change,
            recent: snapshot.history[len.saturating_sub(RECENT_ROWS)..]
                .iter()
                .map(|p| RecentRow {
                    date: p.timestamp.format("%Y-%m-%d").to_string(),
                    close: p.close,
                    volume: p.volume,
                })
                .collect(),
            analysis_json: serde_json::to_string_pretty(analysis)?,
        };

        Ok(self.template.render(&context)?)
    }
}
