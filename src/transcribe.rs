//! Speech-to-text boundary
//! Invoked before the core receives its turn input

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// The audio was received but not understood
    #[error("audio could not be understood")]
    Unrecognized,
    #[error("transcription service failed: {0}")]
    Service(String),
}

impl From<reqwest::Error> for TranscriptionError {
    fn from(e: reqwest::Error) -> Self {
        TranscriptionError::Service(e.to_string())
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio blob to text
    async fn transcribe(&self, audio: &[u8]) -> Result<String, TranscriptionError>;
}

/// HTTP client for a speech recognition service
pub struct SttClient {
    client: Client,
    base_url: String,
    language: String,
}

#[derive(Debug, Deserialize)]
struct RecognitionResponse {
    text: String,
}

impl SttClient {
    pub fn new(base_url: &str) -> Result<Self, TranscriptionError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            language: "ja-JP".to_string(),
        })
    }
}

#[async_trait]
impl Transcriber for SttClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, TranscriptionError> {
        let url = format!("{}/recognize", self.base_url);

        let body = serde_json::json!({
            "audio": base64::engine::general_purpose::STANDARD.encode(audio),
            "language": self.language,
        });

        let response = self.client.post(&url).json(&body).send().await?;

        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Err(TranscriptionError::Unrecognized);
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Service(format!(
                "Status {}: {}",
                status, text
            )));
        }

        let response: RecognitionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Service(e.to_string()))?;

        if response.text.trim().is_empty() {
            return Err(TranscriptionError::Unrecognized);
        }

        Ok(response.text)
    }
}
