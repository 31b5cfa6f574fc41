//! Speech synthesis boundary
//! Turns response text into an opaque base64 audio payload, keyed by the
//! character's voice id

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis request failed: {0}")]
    Service(String),
    #[error("synthesis timed out")]
    Timeout,
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SynthesisError::Timeout
        } else {
            SynthesisError::Service(e.to_string())
        }
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize speech for the given voice and text, returning base64
    /// encoded audio
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<String, SynthesisError>;
}

/// HTTP client for a style-bert-vits2 style synthesis server
pub struct TtsClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    audio: String,
}

impl TtsClient {
    pub fn new(base_url: &str) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for TtsClient {
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<String, SynthesisError> {
        let url = format!("{}/synthesize", self.base_url);

        let body = serde_json::json!({
            "voice_id": voice_id,
            "text": text,
        });

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Service(format!(
                "Status {}: {}",
                status, text
            )));
        }

        let response: SynthesisResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::Service(e.to_string()))?;

        Ok(response.audio)
    }
}
