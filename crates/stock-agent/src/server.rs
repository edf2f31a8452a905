//! HTTP surface: `GET /stock` and `GET /health`

use axum::{
    Json, Router,
    extract::{Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::agents::StockRecommendationAgent;
use crate::error::StockError;
use crate::models::{StockQuery, StockRecommendation};

/// Body returned for any failure that is not the caller's fault
pub const GENERIC_ERROR: &str = "An unexpected error occurred";

/// Where the server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    agent: Arc<StockRecommendationAgent>,
    started_at: Instant,
}

impl AppState {
    pub fn new(agent: StockRecommendationAgent) -> Self {
        Self {
            agent: Arc::new(agent),
            started_at: Instant::now(),
        }
    }
}

/// Query parameters of `GET /stock`
#[derive(Debug, Default, Deserialize)]
pub struct StockParams {
    pub ticker: Option<String>,
    pub stock: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/stock", get(get_stock))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(middleware::from_fn(request_span))
}

async fn get_stock(
    State(state): State<AppState>,
    Query(params): Query<StockParams>,
) -> Result<Json<StockRecommendation>, ApiError> {
    info!(ticker = ?params.ticker, stock = ?params.stock, "Received stock request");

    let query = StockQuery::from_params(params.ticker.as_deref(), params.stock.as_deref())?;
    let recommendation = state
        .agent
        .generate_comprehensive_recommendation(&query)
        .await?;

    Ok(Json(recommendation))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// Wrap each request in a span carrying a fresh request id
async fn request_span(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "request",
        %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let started = Instant::now();
        let mut response = next.run(request).await;

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert("x-request-id", value);
        }
        info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis(),
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await
}

/// Maps [`StockError`] to a JSON error response
#[derive(Debug)]
pub struct ApiError(StockError);

impl From<StockError> for ApiError {
    fn from(error: StockError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = if self.0.is_client_error() {
            warn!(error = %self.0, "Rejected request");
            (StatusCode::BAD_REQUEST, self.0.to_string())
        } else {
            error!(error = %self.0, "Request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR.to_string())
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Bind and serve until a shutdown signal arrives
pub async fn serve(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %listener.local_addr()?, "Stock market agent listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}
