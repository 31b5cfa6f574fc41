//! OpenAI-compatible embeddings client
//! Supports the OpenAI API and any compatible endpoint (custom base URL)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::provider::{EmbeddingProvider, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMS: usize = 1536;

pub struct OpenAiEmbeddings {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dims: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::with_model(
            api_key,
            DEFAULT_MODEL,
            base_url.unwrap_or(DEFAULT_BASE_URL),
            DEFAULT_DIMS,
        )
    }

    pub fn with_model(
        api_key: &str,
        model: &str,
        base_url: &str,
        dims: usize,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("Status {}: {}", status, text)));
        }

        let response: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Api(e.to_string()))?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| ProviderError::Api("No embedding in response".to_string()))?;

        if embedding.len() != self.dims {
            return Err(ProviderError::Api(format!(
                "expected {} dimensions, got {}",
                self.dims,
                embedding.len()
            )));
        }

        Ok(embedding)
    }
}
