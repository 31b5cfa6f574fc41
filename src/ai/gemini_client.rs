//! Gemini client for structured chat turns
//! Requests JSON output and validates it against the structured response shape

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::provider::{LanguageModel, ProviderError};
use crate::schema::{CharacterEvent, Emotion, GameMove, GameOutcome, Hand, StructuredResponse};

const DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ContentResponse,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

/// Model output before validation. Field spellings match the output contract
/// given in the system prompt.
#[derive(Debug, Deserialize)]
struct RawStructured {
    content: String,
    emotion: RawEmotion,
    #[serde(default)]
    event: Option<RawEvent>,
    #[serde(default)]
    game_ai_choice: Option<String>,
    #[serde(default)]
    game_result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEmotion {
    neutral: f32,
    happy: f32,
    sad: f32,
    angry: f32,
}

/// The model sometimes emits the event as {"type": "sit"} and sometimes as a
/// bare string; accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEvent {
    Typed {
        #[serde(rename = "type")]
        kind: Option<String>,
    },
    Plain(String),
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL)
    }

    pub fn with_model(api_key: String, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.to_string(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn structured_chat(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<StructuredResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("gemini".to_string()));
        }

        let request = GeminiRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: system_prompt.to_string(),
                }],
            },
            contents: vec![Content {
                parts: vec![Part {
                    text: user_message.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 500,
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(self.api_url())
            .json(&request)
            .send()
            .await?
            .json::<GeminiResponse>()
            .await?;

        if let Some(error) = response.error {
            return Err(ProviderError::Api(format!(
                "Gemini API error: {}",
                error.message
            )));
        }

        let text = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.parts.first().map(|p| p.text.clone()))
            .ok_or_else(|| ProviderError::Api("No candidates in response".to_string()))?;

        parse_structured(&text)
    }
}

/// Parse model output into a validated structured response.
/// Shape violations are fatal for the turn, never silently defaulted.
pub fn parse_structured(text: &str) -> Result<StructuredResponse, ProviderError> {
    let cleaned = strip_code_fences(text);
    let raw: RawStructured = serde_json::from_str(cleaned)
        .map_err(|e| ProviderError::SchemaMismatch(format!("invalid JSON: {}", e)))?;

    let emotion = Emotion::new(
        raw.emotion.neutral,
        raw.emotion.happy,
        raw.emotion.sad,
        raw.emotion.angry,
    );
    if !emotion.in_bounds() {
        return Err(ProviderError::SchemaMismatch(format!(
            "emotion values out of [0.0, 1.0]: {:?}",
            emotion
        )));
    }

    let event = match raw.event {
        None => None,
        Some(RawEvent::Typed { kind: None }) => None,
        Some(RawEvent::Typed { kind: Some(kind) }) | Some(RawEvent::Plain(kind)) => {
            parse_event(&kind)?
        }
    };

    let game = match (raw.game_ai_choice.as_deref(), raw.game_result.as_deref()) {
        (None, None) | (Some("none"), Some("none")) | (None, Some("none"))
        | (Some("none"), None) => None,
        (Some(choice), Some(result)) => Some(GameMove {
            ai_choice: parse_hand(choice)?,
            outcome: parse_outcome(result)?,
        }),
        _ => {
            return Err(ProviderError::SchemaMismatch(
                "game_ai_choice and game_result must be set together".to_string(),
            ))
        }
    };

    Ok(StructuredResponse {
        // The role is ours to assign; whatever the model claims is ignored
        role: "assistant".to_string(),
        content: raw.content,
        emotion,
        event,
        game,
    })
}

fn parse_event(kind: &str) -> Result<Option<CharacterEvent>, ProviderError> {
    match kind {
        "sit" => Ok(Some(CharacterEvent::Sit)),
        "go_to_user_position" => Ok(Some(CharacterEvent::GoToUserPosition)),
        "none" | "" => Ok(None),
        other => Err(ProviderError::SchemaMismatch(format!(
            "unknown event type: {}",
            other
        ))),
    }
}

fn parse_hand(value: &str) -> Result<Hand, ProviderError> {
    match value {
        "rock" => Ok(Hand::Rock),
        "paper" => Ok(Hand::Paper),
        "scissors" => Ok(Hand::Scissors),
        other => Err(ProviderError::SchemaMismatch(format!(
            "unknown hand: {}",
            other
        ))),
    }
}

fn parse_outcome(value: &str) -> Result<GameOutcome, ProviderError> {
    match value {
        "win" => Ok(GameOutcome::Win),
        "lose" => Ok(GameOutcome::Lose),
        "draw" => Ok(GameOutcome::Draw),
        other => Err(ProviderError::SchemaMismatch(format!(
            "unknown game result: {}",
            other
        ))),
    }
}

/// Strip markdown code fences some models wrap JSON in
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let text = r#"{
            "role": "assistant",
            "content": "おかえり！今日も一緒にがんばろう",
            "emotion": {"neutral": 0.2, "happy": 0.8, "sad": 0.0, "angry": 0.0},
            "event": {"type": "go_to_user_position"},
            "game_ai_choice": null,
            "game_result": null
        }"#;
        let response = parse_structured(text).unwrap();
        assert_eq!(response.role, "assistant");
        assert_eq!(response.event, Some(CharacterEvent::GoToUserPosition));
        assert!(response.game.is_none());
    }

    #[test]
    fn test_model_claimed_role_is_overridden() {
        let text = r#"{
            "role": "user",
            "content": "なりすまし",
            "emotion": {"neutral": 1.0, "happy": 0.0, "sad": 0.0, "angry": 0.0}
        }"#;
        let response = parse_structured(text).unwrap();
        assert_eq!(response.role, "assistant");
    }

    #[test]
    fn test_parse_with_code_fences() {
        let text = "```json\n{\"content\": \"うん\", \"emotion\": {\"neutral\": 0.9, \"happy\": 0.1, \"sad\": 0.0, \"angry\": 0.0}}\n```";
        let response = parse_structured(text).unwrap();
        assert_eq!(response.content, "うん");
        assert!(response.event.is_none());
    }

    #[test]
    fn test_out_of_bounds_emotion_rejected() {
        let text = r#"{"content": "x", "emotion": {"neutral": 1.5, "happy": 0.0, "sad": 0.0, "angry": 0.0}}"#;
        assert!(matches!(
            parse_structured(text),
            Err(ProviderError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_game_fields_travel_together() {
        let text = r#"{"content": "x", "emotion": {"neutral": 0.5, "happy": 0.5, "sad": 0.0, "angry": 0.0}, "game_ai_choice": "rock"}"#;
        assert!(matches!(
            parse_structured(text),
            Err(ProviderError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_string_none_game_fields() {
        let text = r#"{"content": "x", "emotion": {"neutral": 0.5, "happy": 0.5, "sad": 0.0, "angry": 0.0}, "game_ai_choice": "none", "game_result": "none"}"#;
        let response = parse_structured(text).unwrap();
        assert!(response.game.is_none());
    }

    #[test]
    fn test_unparsable_output_is_fatal() {
        assert!(matches!(
            parse_structured("ただの文章です"),
            Err(ProviderError::SchemaMismatch(_))
        ));
    }
}
