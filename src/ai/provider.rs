//! Provider traits and shared error type
//! Unified seams for the language model and embedding backends

use async_trait::async_trait;
use thiserror::Error;

use crate::schema::StructuredResponse;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {0} not configured")]
    NotConfigured(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("structured output did not parse: {0}")]
    SchemaMismatch(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

/// Language model seam: prompt in, schema-validated structured response out
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Run one structured chat turn. The output must conform to the
    /// structured response shape; anything else is a SchemaMismatch.
    async fn structured_chat(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<StructuredResponse, ProviderError>;
}

/// Embedding seam: text in, fixed-dimension vector out
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding dimensionality
    fn dims(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}
