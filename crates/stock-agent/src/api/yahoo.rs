//! Yahoo Finance API client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Mutex;
use time::{Date, Month, OffsetDateTime};
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

use super::{MarketDataProvider, RetryPolicy};
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::models::{CompanyProfile, PricePoint};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Yahoo rejects requests without a browser-like agent
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

const SEARCH_COUNTRY: &str = "United States";

/// Yahoo Finance API client
///
/// Daily history and the quote summary go through `yahoo_finance_api`.
/// Symbol search is a plain JSON endpoint under `base_url`, called with
/// `reqwest`. Every call waits on a shared per-minute rate limiter and runs
/// under the retry policy.
#[derive(Clone)]
pub struct YahooFinanceClient {
    http: Client,
    connector: Arc<yahoo::YahooConnector>,
    /// Holds the cookie and crumb the quote summary needs; refreshing them takes `&mut`
    session: Arc<Mutex<yahoo::YahooConnector>>,
    base_url: String,
    history_range: String,
    rate_limiter: SharedRateLimiter,
    retry: RetryPolicy,
}

impl YahooFinanceClient {
    /// Create a client from the service configuration
    pub fn new(config: &StockConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;

        let connector = || {
            yahoo::YahooConnector::new().map_err(|e| StockError::YahooFinanceError(e.to_string()))
        };
        let history = connector()?;
        let session = connector()?;

        let per_minute = NonZeroU32::new(config.rate_limit_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            http,
            connector: Arc::new(history),
            session: Arc::new(Mutex::new(session)),
            base_url: config.yahoo_api_base.clone(),
            history_range: config.history_range.clone(),
            rate_limiter,
            retry: RetryPolicy::from_config(config),
        })
    }

    /// GET a JSON document, mapping non-success statuses to errors
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{path}", self.base_url);
        debug!("Yahoo request: {} {:?}", url, query);

        let response = self.http.get(&url).query(query).send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(StockError::RateLimitExceeded {
                provider: "Yahoo Finance".to_string(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StockError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    async fn fetch_history(&self, symbol: &str) -> Result<Vec<PricePoint>> {
        self.rate_limiter.until_ready().await;

        let end = OffsetDateTime::now_utc();
        let start = range_start(&self.history_range, end)?;

        let response = self
            .connector
            .get_quote_history(symbol, start, end)
            .await
            .map_err(|e| map_yahoo_error(symbol, e))?;

        let quotes = response.quotes().map_err(|e| map_yahoo_error(symbol, e))?;

        Ok(quotes
            .iter()
            .filter_map(|q| {
                let timestamp = i64::try_from(q.timestamp)
                    .ok()
                    .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))?;
                Some(PricePoint {
                    timestamp,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                    adjclose: q.adjclose,
                })
            })
            .collect())
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile> {
        self.rate_limiter.until_ready().await;

        let summary = {
            let mut session = self.session.lock().await;
            session
                .get_ticker_info(symbol)
                .await
                .map_err(|e| map_yahoo_error(symbol, e))?
        };

        profile_from_summary(symbol, summary)
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceClient {
    #[instrument(skip(self))]
    async fn search_symbol(&self, query: &str) -> Result<Option<String>> {
        let params = [
            ("q", query),
            ("quotes_count", "1"),
            ("country", SEARCH_COUNTRY),
        ];
        let response: SearchResponse = self
            .retry
            .execute("yahoo_search", || {
                self.get_json("/v1/finance/search", &params)
            })
            .await?;

        Ok(response
            .quotes
            .into_iter()
            .find_map(|quote| quote.symbol.filter(|s| !s.is_empty())))
    }

    #[instrument(skip(self))]
    async fn price_history(&self, symbol: &str) -> Result<Vec<PricePoint>> {
        let history = self
            .retry
            .execute("yahoo_history", || self.fetch_history(symbol))
            .await?;
        debug!(points = history.len(), "Fetched price history");
        Ok(history)
    }

    #[instrument(skip(self))]
    async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile> {
        self.retry
            .execute("yahoo_quote_summary", || self.fetch_profile(symbol))
            .await
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

/// Sort a `yahoo_finance_api` failure into missing data, retryable outages
/// and hard rejections
fn map_yahoo_error(symbol: &str, err: yahoo::YahooError) -> StockError {
    use yahoo::YahooError as Y;

    let unavailable = |reason: String| StockError::DataUnavailable {
        symbol: symbol.to_string(),
        reason,
    };

    match err {
        // Carries the connector's own reqwest error type
        Y::ConnectionFailed(e) => StockError::UpstreamUnavailable(e.to_string()),
        Y::TooManyRequests(_) => StockError::RateLimitExceeded {
            provider: "Yahoo Finance".to_string(),
        },
        Y::FetchFailed(message) => StockError::UpstreamUnavailable(message),
        Y::NoResponse => StockError::UpstreamUnavailable(err.to_string()),
        Y::ApiError(message) => unavailable(
            message
                .description
                .or(message.code)
                .unwrap_or_else(|| "Yahoo returned an error".to_string()),
        ),
        Y::NoResult | Y::NoQuotes | Y::DataInconsistency | Y::MissingField(_) => {
            unavailable(err.to_string())
        }
        other => StockError::YahooFinanceError(other.to_string()),
    }
}

/// Fundamentals out of a quote summary; a summary without a result is missing data
fn profile_from_summary(symbol: &str, summary: yahoo::YQuoteSummary) -> Result<CompanyProfile> {
    let unavailable = |reason: String| StockError::DataUnavailable {
        symbol: symbol.to_string(),
        reason,
    };

    let summary = summary
        .quote_summary
        .ok_or_else(|| unavailable("empty quote summary".to_string()))?;

    let Some(data) = summary.result.and_then(|results| results.into_iter().next()) else {
        let reason = summary
            .error
            .and_then(|e| e.description.or(e.code))
            .unwrap_or_else(|| "empty quote summary".to_string());
        return Err(unavailable(reason));
    };

    let detail = data.summary_detail;
    let asset_profile = data.asset_profile;
    let key_statistics_beta = data.default_key_statistics.and_then(|k| k.beta);

    Ok(CompanyProfile {
        long_name: data.quote_type.and_then(|q| q.long_name.or(q.short_name)),
        sector: asset_profile.as_ref().and_then(|p| p.sector.clone()),
        industry: asset_profile.and_then(|p| p.industry),
        market_cap: detail.as_ref().and_then(|d| d.market_cap).map(|cap| cap as f64),
        // Yahoo reports "Infinity" for loss-making companies
        trailing_pe: detail
            .as_ref()
            .and_then(|d| d.trailing_pe)
            .filter(|pe| pe.is_finite()),
        dividend_yield: detail.as_ref().and_then(|d| d.dividend_yield),
        beta: detail.and_then(|d| d.beta).or(key_statistics_beta),
    })
}

/// Start of the history window ending at `end`
fn range_start(range: &str, end: OffsetDateTime) -> Result<OffsetDateTime> {
    let days = match range {
        "1mo" => 30,
        "3mo" => 90,
        "6mo" => 180,
        "1y" => 365,
        "2y" => 730,
        "5y" => 1825,
        "10y" => 3650,
        "max" => 365 * 50,
        "ytd" => {
            let jan_first = Date::from_calendar_date(end.year(), Month::January, 1)
                .map_err(|e| StockError::ConfigError(format!("Invalid ytd start: {e}")))?;
            return Ok(end.replace_date(jan_first).replace_time(time::Time::MIDNIGHT));
        }
        other => {
            return Err(StockError::ConfigError(format!(
                "Invalid history range: {other}"
            )));
        }
    };
    Ok(end - time::Duration::days(days))
}

// ============================================================================
// Yahoo wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
struct SearchQuote {
    #[serde(default)]
    symbol: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn browser_agent(request: &Request) -> bool {
        request
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            == Some(BROWSER_USER_AGENT)
    }

    fn client_for(server: &MockServer) -> YahooFinanceClient {
        let config = StockConfig::builder()
            .yahoo_api_base(server.uri())
            .max_attempts(2)
            .retry_backoff_base(Duration::from_millis(1))
            .rate_limit_per_minute(1000)
            .build()
            .unwrap();
        YahooFinanceClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_search_symbol_returns_first_quote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .and(query_param("q", "Apple"))
            .and(query_param("quotes_count", "1"))
            .and(query_param("country", "United States"))
            .and(browser_agent)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quotes": [{"symbol": "AAPL", "shortname": "Apple Inc."}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let symbol = client_for(&server).search_symbol("Apple").await.unwrap();
        assert_eq!(symbol.as_deref(), Some("AAPL"));
    }

    #[tokio::test]
    async fn test_search_symbol_without_quotes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"quotes": []})))
            .mount(&server)
            .await;

        let symbol = client_for(&server).search_symbol("Zzzyx").await.unwrap();
        assert_eq!(symbol, None);
    }

    #[tokio::test]
    async fn test_search_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = client_for(&server).search_symbol("Apple").await.unwrap_err();
        assert!(matches!(err, StockError::ApiError { status: 503, .. }));
    }

    fn summary(value: serde_json::Value) -> yahoo::YQuoteSummary {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_profile_from_summary() {
        let profile = profile_from_summary(
            "MSFT",
            summary(json!({
                "quoteSummary": {
                    "result": [{
                        "quoteType": {"symbol": "MSFT", "shortName": "Microsoft", "longName": "Microsoft Corporation"},
                        "summaryDetail": {
                            "trailingPE": 35.2,
                            "dividendYield": 0.0072,
                            "marketCap": 3_100_000_000_000_u64
                        },
                        "defaultKeyStatistics": {"beta": 0.9},
                        "assetProfile": {
                            "sector": "Technology",
                            "industry": "Software - Infrastructure",
                            "companyOfficers": []
                        }
                    }],
                    "error": null
                }
            })),
        )
        .unwrap();

        assert_eq!(profile.long_name.as_deref(), Some("Microsoft Corporation"));
        assert_eq!(profile.sector.as_deref(), Some("Technology"));
        assert_eq!(profile.industry.as_deref(), Some("Software - Infrastructure"));
        assert_eq!(profile.market_cap, Some(3.1e12));
        assert_eq!(profile.trailing_pe, Some(35.2));
        assert_eq!(profile.dividend_yield, Some(0.0072));
        assert_eq!(profile.beta, Some(0.9));
    }

    #[test]
    fn test_profile_drops_infinite_pe() {
        let profile = profile_from_summary(
            "RIVN",
            summary(json!({
                "quoteSummary": {
                    "result": [{
                        "quoteType": {"shortName": "Rivian"},
                        "summaryDetail": {"trailingPE": "Infinity", "beta": 2.0}
                    }]
                }
            })),
        )
        .unwrap();

        assert_eq!(profile.long_name.as_deref(), Some("Rivian"));
        assert_eq!(profile.trailing_pe, None);
        assert_eq!(profile.beta, Some(2.0));
        assert_eq!(profile.sector, None);
    }

    #[test]
    fn test_profile_not_found() {
        let err = profile_from_summary(
            "NOPE",
            summary(json!({
                "quoteSummary": {
                    "result": null,
                    "error": {"code": "Not Found", "description": "Quote not found for symbol: NOPE"}
                }
            })),
        )
        .unwrap_err();

        assert!(matches!(
            &err,
            StockError::DataUnavailable { symbol, reason }
                if symbol == "NOPE" && reason.contains("Quote not found")
        ));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_missing_data_errors_are_permanent() {
        for err in [
            yahoo::YahooError::NoQuotes,
            yahoo::YahooError::NoResult,
            yahoo::YahooError::DataInconsistency,
        ] {
            let mapped = map_yahoo_error("ZZZZ", err);
            assert!(matches!(mapped, StockError::DataUnavailable { .. }), "{mapped}");
            assert!(!mapped.is_transient());
        }

        let delisted = summary(json!({
            "finance": {
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }))
        .finance
        .and_then(|f| f.error)
        .unwrap();
        let mapped = map_yahoo_error("ZZZZ", yahoo::YahooError::ApiError(delisted));
        assert!(matches!(
            &mapped,
            StockError::DataUnavailable { reason, .. } if reason.contains("delisted")
        ));
        assert!(!mapped.is_transient());
    }

    #[test]
    fn test_outages_are_transient() {
        let fetch_failed = map_yahoo_error(
            "AAPL",
            yahoo::YahooError::FetchFailed("HTTP error: 503".to_string()),
        );
        assert!(matches!(fetch_failed, StockError::UpstreamUnavailable(_)));
        assert!(fetch_failed.is_transient());

        assert!(map_yahoo_error("AAPL", yahoo::YahooError::NoResponse).is_transient());

        let throttled = map_yahoo_error(
            "AAPL",
            yahoo::YahooError::TooManyRequests("get_crumb".to_string()),
        );
        assert!(matches!(throttled, StockError::RateLimitExceeded { .. }));
        assert!(throttled.is_transient());
    }

    #[test]
    fn test_session_rejections_are_permanent() {
        for err in [
            yahoo::YahooError::InvalidCrumb,
            yahoo::YahooError::Unauthorized,
        ] {
            let mapped = map_yahoo_error("AAPL", err);
            assert!(matches!(mapped, StockError::YahooFinanceError(_)));
            assert!(!mapped.is_transient());
        }
    }

    #[test]
    fn test_range_start() {
        let end = OffsetDateTime::now_utc();
        assert_eq!(range_start("1y", end).unwrap(), end - time::Duration::days(365));

        let ytd = range_start("ytd", end).unwrap();
        assert_eq!(ytd.month(), Month::January);
        assert_eq!(ytd.day(), 1);

        assert!(range_start("1d", end).is_err());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_price_history() {
        let client = YahooFinanceClient::new(&StockConfig::default()).unwrap();
        let history = client.price_history("AAPL").await.unwrap();
        assert!(history.len() > 200);
        assert!(history.iter().all(|p| p.close > 0.0));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_company_profile() {
        let client = YahooFinanceClient::new(&StockConfig::default()).unwrap();
        let profile = client.company_profile("AAPL").await.unwrap();
        assert_eq!(profile.sector.as_deref(), Some("Technology"));
        assert!(profile.market_cap.is_some_and(|cap| cap > 1e11));
    }
}
