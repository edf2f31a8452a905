//! Stock market agent HTTP server
//!
//! # Usage
//!
//! ```bash
//! cp .env.example .env   # then set OPENAI_API_KEY
//! cargo run --bin stock-server -p stock-agent -- --port 5000
//! ```

use agent_llm::providers::OpenAIProvider;
use agent_utils::{LogFormat, LoggingConfig, init_tracing, load_dotenv};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use stock_agent::{AppState, ServerConfig, StockConfig, StockRecommendationAgent, server};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stock-server")]
#[command(about = "Stock recommendation HTTP service", long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Directory for daily log files
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Stdout log format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before clap so .env values feed the env fallbacks
    let dotenv_path = load_dotenv();
    let args = Args::parse();

    let log_path = init_tracing(&LoggingConfig {
        log_dir: Some(args.log_dir),
        format: LogFormat::from_str_case_insensitive(&args.log_format),
        ..LoggingConfig::default()
    })?;

    info!(env_file = ?dotenv_path, log_file = ?log_path, "Starting stock market agent");

    let server_config = ServerConfig {
        host: args.host,
        port: args.port,
    };

    let stock_config = StockConfig::from_env().context("invalid stock configuration")?;
    let llm = OpenAIProvider::from_env().context("OpenAI provider is not configured")?;
    let agent = StockRecommendationAgent::from_config(stock_config, Arc::new(llm))?;

    server::serve(&server_config, AppState::new(agent)).await?;

    info!("Server stopped");
    Ok(())
}
