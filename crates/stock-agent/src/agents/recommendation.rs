//! Stock recommendation agent
//!
//! Runs the fixed pipeline behind `GET /stock`:
//! 1. resolve the query to a ticker ([`TickerLookupTool`] for names)
//! 2. retrieve stock data ([`StockDataTool`])
//! 3. compute the market analysis ([`MarketAnalysisTool`])
//! 4. ask the LLM for a Buy/Hold/Sell call in JSON mode and parse it

use agent_llm::{CompletionRequest, LLMProvider, Message};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::api::{MarketDataProvider, RetryPolicy, YahooFinanceClient};
use crate::cache::CacheManager;
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::models::{Recommendation, StockQuery, StockRecommendation};
use crate::prompts::RecommendationPrompt;
use crate::tools::{MarketAnalysisTool, StockDataTool, TickerLookupTool};

/// Confidence reported when the model leaves it out
const DEFAULT_CONFIDENCE: f64 = 50.0;

/// Completions take far longer than market data requests
const LLM_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Orchestrates the tools and the LLM for one query at a time
pub struct StockRecommendationAgent {
    config: Arc<StockConfig>,
    llm: Arc<dyn LLMProvider>,
    llm_retry: RetryPolicy,
    ticker_lookup: TickerLookupTool,
    stock_data: StockDataTool,
    market_analysis: MarketAnalysisTool,
    prompt: RecommendationPrompt,
}

impl StockRecommendationAgent {
    /// Create a new agent
    pub fn new(
        config: Arc<StockConfig>,
        market_data: Arc<dyn MarketDataProvider>,
        llm: Arc<dyn LLMProvider>,
    ) -> Result<Self> {
        info!(
            market_data = market_data.name(),
            llm = llm.name(),
            model = %config.model,
            "Initializing StockRecommendationAgent"
        );

        let caches = CacheManager::new(config.cache_ttl_realtime, config.cache_ttl_search);

        Ok(Self {
            ticker_lookup: TickerLookupTool::new(Arc::clone(&market_data), caches.search.clone()),
            stock_data: StockDataTool::new(market_data, caches.realtime.clone()),
            market_analysis: MarketAnalysisTool::new(),
            prompt: RecommendationPrompt::new()?,
            llm_retry: RetryPolicy {
                attempt_timeout: LLM_ATTEMPT_TIMEOUT,
                ..RetryPolicy::from_config(&config)
            },
            config,
            llm,
        })
    }

    /// Create an agent backed by Yahoo Finance
    pub fn from_config(config: StockConfig, llm: Arc<dyn LLMProvider>) -> Result<Self> {
        config.validate()?;
        let yahoo = YahooFinanceClient::new(&config)?;
        Self::new(Arc::new(config), Arc::new(yahoo), llm)
    }

    /// Ticker for the given parameters: the ticker itself, else the resolved name
    pub async fn get_ticker_symbol(
        &self,
        ticker: Option<&str>,
        name: Option<&str>,
    ) -> Result<String> {
        let query = StockQuery::from_params(ticker, name)?;
        self.resolve(&query).await
    }

    async fn resolve(&self, query: &StockQuery) -> Result<String> {
        match query {
            StockQuery::Ticker(ticker) => Ok(ticker.clone()),
            StockQuery::Name(name) => {
                info!(%name, "Converting stock name to ticker");
                self.ticker_lookup.run(name).await
            }
        }
    }

    /// Run the full pipeline for `query`
    #[instrument(skip(self))]
    pub async fn generate_comprehensive_recommendation(
        &self,
        query: &StockQuery,
    ) -> Result<StockRecommendation> {
        let ticker = self.resolve(query).await?;

        info!("Step 1: Retrieving stock data for {}", ticker);
        let snapshot = self.stock_data.run(&ticker).await?;

        info!("Step 2: Performing market analysis for {}", ticker);
        let analysis = self.market_analysis.run(&snapshot)?;

        info!("Step 3: Generating LLM recommendation for {}", ticker);
        let request = CompletionRequest::builder(&self.config.model)
            .system(self.prompt.system())
            .add_message(Message::user(self.prompt.render(&snapshot, &analysis)?))
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .json_mode()
            .build();

        let response = self
            .llm_retry
            .execute("llm_completion", || async {
                self.llm
                    .complete(request.clone())
                    .await
                    .map_err(StockError::from)
            })
            .await?;
        let parsed = parse_llm_recommendation(response.message.text())?;

        info!(
            recommendation = ?parsed.recommendation,
            confidence = parsed.confidence_score,
            tokens = response.usage.total(),
            "Successfully generated recommendation for {}",
            ticker
        );

        Ok(StockRecommendation {
            company_name: snapshot.profile.long_name.clone(),
            ticker,
            recommendation: parsed.recommendation,
            confidence_score: parsed.confidence_score,
            key_insights: parsed.key_insights,
            risk_assessment: parsed.risk_assessment,
            price_target: parsed.price_target,
            market_analysis: analysis,
            generated_at: Utc::now(),
        })
    }
}

/// Shape the model is asked for; every field but the verdict is loosely typed
#[derive(Debug, Deserialize)]
struct RawRecommendation {
    recommendation: String,
    #[serde(default)]
    confidence_score: Value,
    #[serde(default)]
    key_insights: Value,
    #[serde(default)]
    risk_assessment: Value,
    #[serde(default)]
    price_target: Value,
}

#[derive(Debug, PartialEq)]
struct ParsedRecommendation {
    recommendation: Recommendation,
    confidence_score: f64,
    key_insights: Vec<String>,
    risk_assessment: Value,
    price_target: Option<Value>,
}

/// Drop surrounding ```` ``` ```` / ```` ```json ```` fences if present
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. `json`) on the opening fence line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_llm_recommendation(raw: &str) -> Result<ParsedRecommendation> {
    let body = strip_code_fences(raw);
    let parsed: RawRecommendation = serde_json::from_str(body).map_err(|e| {
        StockError::InvalidLlmResponse(format!("response is not the expected JSON object: {e}"))
    })?;

    let recommendation = Recommendation::parse(&parsed.recommendation).ok_or_else(|| {
        StockError::InvalidLlmResponse(format!(
            "unknown recommendation '{}'",
            parsed.recommendation
        ))
    })?;

    let confidence_score = normalize_confidence(&parsed.confidence_score).unwrap_or_else(|| {
        warn!(value = %parsed.confidence_score, "Unusable confidence score, using default");
        DEFAULT_CONFIDENCE
    });

    Ok(ParsedRecommendation {
        recommendation,
        confidence_score,
        key_insights: insights(parsed.key_insights),
        risk_assessment: parsed.risk_assessment,
        price_target: Some(parsed.price_target).filter(|v| !v.is_null()),
    })
}

/// Scale to 0..=100; fractions up to 1.0 are read as proportions
fn normalize_confidence(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
        _ => return None,
    };
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    let scaled = if number <= 1.0 { number * 100.0 } else { number };
    Some(scaled.min(100.0))
}

fn insights(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompanyProfile, PricePoint};
    use agent_llm::{CompletionResponse, LLMError, StopReason, TokenUsage};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeMarket;

    #[async_trait]
    impl MarketDataProvider for FakeMarket {
        async fn search_symbol(&self, query: &str) -> Result<Option<String>> {
            Ok((query == "Apple").then(|| "AAPL".to_string()))
        }

        async fn price_history(&self, _symbol: &str) -> Result<Vec<PricePoint>> {
            Ok((0..60)
                .map(|i| PricePoint {
                    timestamp: Utc::now(),
                    open: 100.0,
                    high: 100.0,
                    low: 100.0,
                    close: 100.0 + f64::from(i),
                    volume: 1_000,
                    adjclose: 100.0,
                })
                .collect())
        }

        async fn company_profile(&self, _symbol: &str) -> Result<CompanyProfile> {
            Ok(CompanyProfile {
                long_name: Some("Apple Inc.".to_string()),
                ..CompanyProfile::default()
            })
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    struct CannedLlm {
        reply: String,
        /// Calls answered with `failure` before the reply is returned
        failures: usize,
        failure: fn() -> LLMError,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LLMProvider for CannedLlm {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> agent_llm::Result<CompletionResponse> {
            let calls = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request);
                requests.len()
            };
            if calls <= self.failures {
                return Err((self.failure)());
            }
            Ok(CompletionResponse {
                message: Message::assistant(self.reply.clone()),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }

        fn name(&self) -> &'static str {
            "canned"
        }
    }

    fn server_error() -> LLMError {
        LLMError::RequestFailed("HTTP 500".to_string())
    }

    fn flaky_agent(
        failures: usize,
        failure: fn() -> LLMError,
    ) -> (StockRecommendationAgent, Arc<CannedLlm>) {
        let llm = Arc::new(CannedLlm {
            reply: REPLY.to_string(),
            failures,
            failure,
            requests: Mutex::new(Vec::new()),
        });
        let config = StockConfig::builder()
            .retry_backoff_base(Duration::from_millis(1))
            .build()
            .unwrap();
        let agent =
            StockRecommendationAgent::new(Arc::new(config), Arc::new(FakeMarket), llm.clone())
                .unwrap();
        (agent, llm)
    }

    fn agent() -> (StockRecommendationAgent, Arc<CannedLlm>) {
        flaky_agent(0, server_error)
    }

    const REPLY: &str = r#"```json
{"recommendation": "Buy", "confidence_score": 0.82, "key_insights": ["Strong uptrend"], "risk_assessment": {"level": "medium"}, "price_target": 175}
```"#;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_normalize_confidence() {
        assert_eq!(normalize_confidence(&json!(85)), Some(85.0));
        assert_eq!(normalize_confidence(&json!(0.75)), Some(75.0));
        assert_eq!(normalize_confidence(&json!("90%")), Some(90.0));
        assert_eq!(normalize_confidence(&json!(250)), Some(100.0));
        assert_eq!(normalize_confidence(&json!("high")), None);
        assert_eq!(normalize_confidence(&json!(-3)), None);
    }

    #[test]
    fn test_parse_llm_recommendation() {
        let parsed = parse_llm_recommendation(REPLY).unwrap();
        assert_eq!(parsed.recommendation, Recommendation::Buy);
        assert!((parsed.confidence_score - 82.0).abs() < 1e-9);
        assert_eq!(parsed.key_insights, vec!["Strong uptrend".to_string()]);
        assert_eq!(parsed.price_target, Some(json!(175)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_llm_recommendation("I think you should buy"),
            Err(StockError::InvalidLlmResponse(_))
        ));
        assert!(matches!(
            parse_llm_recommendation(r#"{"recommendation": "Maybe"}"#),
            Err(StockError::InvalidLlmResponse(_))
        ));
    }

    #[test]
    fn test_parse_defaults_missing_fields() {
        let parsed = parse_llm_recommendation(r#"{"recommendation": "hold", "key_insights": "Flat"}"#).unwrap();
        assert_eq!(parsed.recommendation, Recommendation::Hold);
        assert!((parsed.confidence_score - DEFAULT_CONFIDENCE).abs() < f64::EPSILON);
        assert_eq!(parsed.key_insights, vec!["Flat".to_string()]);
        assert_eq!(parsed.price_target, None);
    }

    #[tokio::test]
    async fn test_get_ticker_symbol() {
        let (agent, _) = agent();
        assert_eq!(agent.get_ticker_symbol(Some("msft"), None).await.unwrap(), "MSFT");
        assert_eq!(agent.get_ticker_symbol(None, Some("Apple")).await.unwrap(), "AAPL");
        assert!(matches!(
            agent.get_ticker_symbol(None, Some("Nobody")).await,
            Err(StockError::TickerNotFound(_))
        ));
        assert!(matches!(
            agent.get_ticker_symbol(None, None).await,
            Err(StockError::MissingQuery)
        ));
    }

    #[tokio::test]
    async fn test_generate_recommendation_end_to_end() {
        let (agent, llm) = agent();
        let result = agent
            .generate_comprehensive_recommendation(&StockQuery::Name("Apple".to_string()))
            .await
            .unwrap();

        assert_eq!(result.ticker, "AAPL");
        assert_eq!(result.company_name.as_deref(), Some("Apple Inc."));
        assert_eq!(result.recommendation, Recommendation::Buy);
        assert!(result.market_analysis.technical_indicators.sma_50 > 0.0);

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o");
        assert_eq!(requests[0].temperature, Some(0.3));
        assert_eq!(requests[0].response_format, Some(agent_llm::ResponseFormat::JsonObject));
        assert!(requests[0].messages[0].text().contains("AAPL"));
    }

    #[tokio::test]
    async fn test_llm_failure_propagates_after_retries() {
        let (agent, llm) = flaky_agent(usize::MAX, server_error);
        let err = agent
            .generate_comprehensive_recommendation(&StockQuery::Ticker("AAPL".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Llm(_)));
        assert!(!err.is_client_error());
        assert_eq!(llm.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_transient_llm_failure_is_retried() {
        let (agent, llm) = flaky_agent(1, || LLMError::RateLimitExceeded("slow down".to_string()));
        let result = agent
            .generate_comprehensive_recommendation(&StockQuery::Ticker("AAPL".to_string()))
            .await
            .unwrap();
        assert_eq!(result.recommendation, Recommendation::Buy);
        assert_eq!(llm.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let (agent, llm) = flaky_agent(usize::MAX, || LLMError::AuthenticationFailed);
        let err = agent
            .generate_comprehensive_recommendation(&StockQuery::Ticker("AAPL".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Llm(LLMError::AuthenticationFailed)));
        assert_eq!(llm.requests.lock().unwrap().len(), 1);
    }
}
