//! Shared utilities for the stock market agent
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and environment-driven configuration helpers.

pub mod config;
pub mod logging;

pub use config::{ConfigError, env_or, env_parse, load_dotenv};
pub use logging::{LogFormat, LoggingConfig, LoggingError, init_tracing, log_file_name};
