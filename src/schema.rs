//! Structured response schema
//! The multi-field output of a single assistant turn: text, emotion,
//! physical event, and the rock-paper-scissors game fields

use serde::{Deserialize, Serialize};

use crate::error::TurnError;

/// Emotion intensities, each independently in [0.0, 1.0].
/// These are intensities, not a probability distribution - they do not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emotion {
    pub neutral: f32,
    pub happy: f32,
    pub sad: f32,
    pub angry: f32,
}

impl Emotion {
    pub fn new(neutral: f32, happy: f32, sad: f32, angry: f32) -> Self {
        Self {
            neutral,
            happy,
            sad,
            angry,
        }
    }

    /// Check every field is within [0.0, 1.0]
    pub fn in_bounds(&self) -> bool {
        [self.neutral, self.happy, self.sad, self.angry]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }

    pub fn validate(&self) -> Result<(), TurnError> {
        if self.in_bounds() {
            Ok(())
        } else {
            Err(TurnError::SchemaMismatch(format!(
                "emotion values out of [0.0, 1.0]: {:?}",
                self
            )))
        }
    }
}

/// A physical action the character performs in the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterEvent {
    Sit,
    GoToUserPosition,
}

/// A rock-paper-scissors hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Rock,
    Paper,
    Scissors,
}

impl Hand {
    pub const ALL: [Hand; 3] = [Hand::Rock, Hand::Paper, Hand::Scissors];

    /// Japanese name used in templated game replies
    pub fn as_japanese(&self) -> &'static str {
        match self {
            Hand::Rock => "グー",
            Hand::Paper => "パー",
            Hand::Scissors => "チョキ",
        }
    }
}

/// Game outcome from the user's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    Win,
    Lose,
    Draw,
}

/// The game field family: present only when the turn resolved a game move.
/// Both fields always travel together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMove {
    pub ai_choice: Hand,
    pub outcome: GameOutcome,
}

/// Validated output of one assistant turn, before voice synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub role: String,
    pub content: String,
    pub emotion: Emotion,
    pub event: Option<CharacterEvent>,
    pub game: Option<GameMove>,
}

impl StructuredResponse {
    pub fn assistant(content: impl Into<String>, emotion: Emotion) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            emotion,
            event: None,
            game: None,
        }
    }

    pub fn with_game(mut self, game: GameMove) -> Self {
        self.game = Some(game);
        self
    }
}

/// The flat record returned to the caller: structured response plus the
/// synthesized voice payload. Absent field families serialize as null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalDelivery {
    pub role: String,
    pub content: String,
    pub emotion: Emotion,
    pub event: Option<CharacterEvent>,
    pub voice: Option<String>,
    pub game_ai_choice: Option<Hand>,
    pub game_result: Option<GameOutcome>,
}

impl FinalDelivery {
    pub fn new(response: StructuredResponse, voice: Option<String>) -> Self {
        let (game_ai_choice, game_result) = match response.game {
            Some(game) => (Some(game.ai_choice), Some(game.outcome)),
            None => (None, None),
        };
        Self {
            role: response.role,
            content: response.content,
            emotion: response.emotion,
            event: response.event,
            voice,
            game_ai_choice,
            game_result,
        }
    }
}
