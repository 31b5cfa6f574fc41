//! Turn error taxonomy
//! Every failure mode of a single request/response cycle, with its HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors that can abort or degrade a conversational turn
#[derive(Debug, Error)]
pub enum TurnError {
    /// Missing, invalid, or expired credential
    #[error("unauthorized")]
    Unauthorized,

    /// Character missing, or private and not owned by the requester.
    /// Both cases collapse to the same error so private characters do not
    /// leak their existence.
    #[error("character not found")]
    CharacterNotFound,

    /// The character has no voice id configured
    #[error("voice not configured for this character")]
    VoiceNotConfigured,

    /// The language model output did not parse as a structured response
    #[error("structured response did not match the expected shape: {0}")]
    SchemaMismatch(String),

    /// The audio input could not be understood
    #[error("audio could not be transcribed")]
    Unrecognized,

    /// The transcription service itself failed
    #[error("transcription service failed: {0}")]
    Transcription(String),

    /// The language model or embedding provider failed
    #[error("provider failed: {0}")]
    Provider(String),

    /// Internal storage fault
    #[error("storage failure: {0}")]
    Store(anyhow::Error),
}

impl TurnError {
    pub fn status(&self) -> StatusCode {
        match self {
            TurnError::Unauthorized => StatusCode::UNAUTHORIZED,
            TurnError::CharacterNotFound => StatusCode::NOT_FOUND,
            TurnError::VoiceNotConfigured
            | TurnError::SchemaMismatch(_)
            | TurnError::Unrecognized
            | TurnError::Transcription(_) => StatusCode::BAD_REQUEST,
            TurnError::Provider(_) => StatusCode::BAD_GATEWAY,
            TurnError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TurnError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = axum::Json(serde_json::json!({
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}
