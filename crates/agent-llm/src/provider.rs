//! Provider seam

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A chat model backend
///
/// Callers hold an `Arc<dyn LLMProvider>`, so tests can swap in a canned
/// implementation.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Run one completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short name for logs, e.g. `openai`
    fn name(&self) -> &str;
}
