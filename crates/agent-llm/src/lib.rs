//! LLM access for the stock market agent
//!
//! - [`Message`] and [`Role`]: chat turns
//! - [`CompletionRequest`] / [`CompletionResponse`]: one call, optionally in
//!   JSON mode
//! - [`LLMProvider`]: the trait the agent depends on
//! - [`providers::OpenAIProvider`]: OpenAI-compatible backend (`openai` feature)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

pub use completion::{
    CompletionRequest, CompletionRequestBuilder, CompletionResponse, ResponseFormat, StopReason,
    TokenUsage,
};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

#[cfg(feature = "openai")]
pub mod providers;
