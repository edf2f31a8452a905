//! End-to-end tests of `GET /stock` with in-memory upstreams

use agent_llm::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, StopReason, TokenUsage,
};
use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stock_agent::{
    AppState, CompanyProfile, MarketDataProvider, PricePoint, StockConfig, StockError,
    StockRecommendationAgent, create_router,
};
use tower::ServiceExt;

struct FakeYahoo {
    searches: AtomicUsize,
    fail_history: bool,
}

#[async_trait]
impl MarketDataProvider for FakeYahoo {
    async fn search_symbol(&self, query: &str) -> stock_agent::Result<Option<String>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(match query.to_lowercase().as_str() {
            "apple" => Some("AAPL".to_string()),
            "microsoft" => Some("MSFT".to_string()),
            _ => None,
        })
    }

    async fn price_history(&self, symbol: &str) -> stock_agent::Result<Vec<PricePoint>> {
        if self.fail_history {
            return Err(StockError::ApiError {
                status: 502,
                message: format!("bad gateway for {symbol}"),
            });
        }
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Ok((0u32..250)
            .map(|day| {
                let close = 150.0 + f64::from(day) * 0.2 + f64::from(day % 7);
                PricePoint {
                    timestamp: start + Duration::days(i64::from(day)),
                    open: close - 1.0,
                    high: close + 1.5,
                    low: close - 2.0,
                    close,
                    volume: 50_000_000 + u64::from(day) * 1_000,
                    adjclose: close,
                }
            })
            .collect())
    }

    async fn company_profile(&self, symbol: &str) -> stock_agent::Result<CompanyProfile> {
        Ok(CompanyProfile {
            long_name: Some(format!("{symbol} Corp.")),
            sector: Some("Technology".to_string()),
            market_cap: Some(2.5e12),
            trailing_pe: Some(28.0),
            beta: Some(1.2),
            ..CompanyProfile::default()
        })
    }

    fn name(&self) -> &'static str {
        "fake-yahoo"
    }
}

#[derive(Default)]
struct RecordingLlm {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LLMProvider for RecordingLlm {
    async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
        if let Some(message) = request.messages.last() {
            self.prompts.lock().unwrap().push(message.text().to_string());
        }
        Ok(CompletionResponse {
            message: Message::assistant(
                r#"{
                    "recommendation": "Hold",
                    "confidence_score": 70,
                    "key_insights": ["Price above the 50-day average", "Valuation is stretched"],
                    "risk_assessment": {"level": "Medium", "notes": "High beta"},
                    "price_target": {"target": 210.0, "horizon": "12 months"}
                }"#,
            ),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 900,
                output_tokens: 120,
            },
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct Harness {
    yahoo: Arc<FakeYahoo>,
    llm: Arc<RecordingLlm>,
    app: axum::Router,
}

fn harness(fail_history: bool) -> Harness {
    let yahoo = Arc::new(FakeYahoo {
        searches: AtomicUsize::new(0),
        fail_history,
    });
    let llm = Arc::new(RecordingLlm::default());
    let agent = StockRecommendationAgent::new(
        Arc::new(StockConfig::default()),
        yahoo.clone(),
        llm.clone(),
    )
    .unwrap();

    Harness {
        app: create_router(AppState::new(agent)),
        yahoo,
        llm,
    }
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn ticker_query_returns_recommendation() {
    let h = harness(false);
    let (status, body) = get(&h.app, "/stock?ticker=aapl").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticker"], "AAPL");
    assert_eq!(body["company_name"], "AAPL Corp.");
    assert_eq!(body["recommendation"], "Hold");
    assert_eq!(body["confidence_score"], 70.0);
    assert_eq!(body["key_insights"].as_array().unwrap().len(), 2);
    assert_eq!(body["price_target"]["horizon"], "12 months");

    let indicators = &body["market_analysis"]["technical_indicators"];
    assert!(indicators["sma_200"].is_number());
    let rsi = indicators["rsi"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&rsi));
    assert!(body["market_analysis"]["risk_assessment"]["overall_risk_score"].is_number());

    assert_eq!(h.yahoo.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn name_query_resolves_ticker() {
    let h = harness(false);
    let (status, body) = get(&h.app, "/stock?stock=Microsoft").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticker"], "MSFT");
    assert_eq!(h.yahoo.searches.load(Ordering::SeqCst), 1);

    let prompts = h.llm.prompts.lock().unwrap();
    assert!(prompts[0].contains("MSFT"));
}

#[tokio::test]
async fn missing_parameters_is_bad_request() {
    let h = harness(false);
    let (status, body) = get(&h.app, "/stock").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please provide either a ticker or stock name");
    assert!(h.llm.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_company_is_bad_request() {
    let h = harness(false);
    let (status, body) = get(&h.app, "/stock?stock=Zzyzx%20Holdings").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Could not find ticker for 'Zzyzx Holdings'");
}

#[tokio::test]
async fn upstream_failure_is_internal_error() {
    let h = harness(true);
    let (status, body) = get(&h.app, "/stock?ticker=AAPL").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "An unexpected error occurred");
    assert!(h.llm.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn ticker_takes_precedence_over_name() {
    let h = harness(false);
    let (status, body) = get(&h.app, "/stock?ticker=MSFT&stock=Apple").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticker"], "MSFT");
    assert_eq!(h.yahoo.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_queries_hit_the_cache() {
    let h = harness(false);
    get(&h.app, "/stock?stock=Apple").await;
    let (status, body) = get(&h.app, "/stock?stock=apple").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticker"], "AAPL");
    assert_eq!(h.yahoo.searches.load(Ordering::SeqCst), 1);
    assert_eq!(h.llm.prompts.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_requests_are_served() {
    let h = harness(false);
    let uris = ["/stock?ticker=AAPL", "/stock?ticker=MSFT", "/stock?stock=Apple", "/health"];

    let responses = futures::future::join_all(uris.iter().map(|uri| get(&h.app, uri))).await;

    for ((status, _), uri) in responses.iter().zip(uris) {
        assert_eq!(*status, StatusCode::OK, "{uri}");
    }
    assert_eq!(h.llm.prompts.lock().unwrap().len(), 3);
}
