//! Chat endpoint handlers
//! One endpoint accepting text (GET) or audio (POST), returning the final
//! delivery record

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use base64::Engine;
use serde::Deserialize;

use super::state::AppContext;
use crate::error::TurnError;
use crate::orchestrator::TurnInput;
use crate::schema::FinalDelivery;
use crate::session::AuthError;
use crate::transcribe::TranscriptionError;

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub text: String,
    pub character_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioChatRequest {
    /// Base64 encoded audio blob
    pub audio: String,
    pub character_id: String,
}

/// Extract and resolve the bearer credential before any core logic runs
async fn authenticate(context: &AppContext, headers: &HeaderMap) -> Result<String, TurnError> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(TurnError::Unauthorized)?;

    context.sessions.authenticate(token).await.map_err(|e| match e {
        AuthError::Unauthorized => TurnError::Unauthorized,
        AuthError::Store(msg) => TurnError::Store(anyhow::anyhow!(msg)),
    })
}

/// GET /chat - text input
pub async fn chat_get(
    State(context): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(query): Query<ChatQuery>,
) -> Result<Json<FinalDelivery>, TurnError> {
    let user_id = authenticate(&context, &headers).await?;

    let delivery = context
        .orchestrator
        .run_turn(TurnInput {
            user_id,
            character_id: query.character_id,
            message: query.text,
        })
        .await?;

    Ok(Json(delivery))
}

/// POST /chat - audio input, transcribed before the core runs
pub async fn chat_post(
    State(context): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(request): Json<AudioChatRequest>,
) -> Result<Json<FinalDelivery>, TurnError> {
    let user_id = authenticate(&context, &headers).await?;

    let audio = base64::engine::general_purpose::STANDARD
        .decode(&request.audio)
        .map_err(|_| TurnError::Unrecognized)?;

    let text = context
        .transcriber
        .transcribe(&audio)
        .await
        .map_err(|e| match e {
            TranscriptionError::Unrecognized => TurnError::Unrecognized,
            TranscriptionError::Service(msg) => TurnError::Transcription(msg),
        })?;

    let delivery = context
        .orchestrator
        .run_turn(TurnInput {
            user_id,
            character_id: request.character_id,
            message: text,
        })
        .await?;

    Ok(Json(delivery))
}
