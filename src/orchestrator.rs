//! Turn orchestration
//! One request/response cycle: resolve character, search memory, detect the
//! game state, generate the response (game path or LLM path), synthesize
//! voice, schedule the memory write, return.

use std::sync::Arc;

use crate::ai::{LanguageModel, ProviderError};
use crate::character::CharacterProvider;
use crate::error::TurnError;
use crate::game::{self, GameTurn};
use crate::memory::{MemoryNamespace, MemoryStore, MemoryWriter};
use crate::prompt;
use crate::schema::{FinalDelivery, GameMove, StructuredResponse};
use crate::study::StudyLog;
use crate::voice::SpeechSynthesizer;

/// One user message bound to a (user, character) pair. Transient: only the
/// derived memory fragment survives the turn.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub user_id: String,
    pub character_id: String,
    pub message: String,
}

/// Explicitly constructed per-process context holding every collaborator.
/// Shared across concurrent turns; the store is the only shared mutable
/// resource and namespace isolation there is structural.
pub struct TurnOrchestrator {
    characters: Arc<dyn CharacterProvider>,
    model: Arc<dyn LanguageModel>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    memory: MemoryStore,
    writer: MemoryWriter,
    study: Option<Arc<StudyLog>>,
}

impl TurnOrchestrator {
    pub fn new(
        characters: Arc<dyn CharacterProvider>,
        model: Arc<dyn LanguageModel>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        memory: MemoryStore,
    ) -> Self {
        let writer = MemoryWriter::new(memory.clone());
        Self {
            characters,
            model,
            synthesizer,
            memory,
            writer,
            study: None,
        }
    }

    pub fn with_study(mut self, study: Arc<StudyLog>) -> Self {
        self.study = Some(study);
        self
    }

    /// Run one turn. Pre-response failures abort with no side effects;
    /// post-response failures (voice, memory write) never invalidate the
    /// already-computed text.
    pub async fn run_turn(&self, input: TurnInput) -> Result<FinalDelivery, TurnError> {
        crate::observability::record_turn();
        let result = self.run_turn_inner(input).await;
        if result.is_err() {
            crate::observability::record_turn_failure();
        }
        result
    }

    async fn run_turn_inner(&self, input: TurnInput) -> Result<FinalDelivery, TurnError> {
        let character = self
            .characters
            .get(&input.character_id)
            .await
            .map_err(TurnError::Store)?
            .ok_or(TurnError::CharacterNotFound)?;

        // Private characters look missing to everyone but their owner
        if !character.accessible_by(&input.user_id) {
            return Err(TurnError::CharacterNotFound);
        }

        let namespace = MemoryNamespace::new(&input.user_id, &input.character_id);
        let memories = self
            .memory
            .search(&namespace, &input.message)
            .await
            .map_err(TurnError::Store)?;
        let memory_text = memories
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let turn = game::detect(&input.message, &memory_text, &mut rand::thread_rng());
        let response = match turn {
            GameTurn::Resolved {
                ai_hand,
                outcome,
                reply,
                ..
            } => {
                crate::observability::record_game_turn();
                tracing::debug!(?ai_hand, ?outcome, "game turn resolved");
                StructuredResponse::assistant(reply, game::heuristic_emotion(outcome)).with_game(
                    GameMove {
                        ai_choice: ai_hand,
                        outcome,
                    },
                )
            }
            GameTurn::Prompted { reply } => {
                crate::observability::record_game_turn();
                StructuredResponse::assistant(reply, game::prompt_emotion())
            }
            GameTurn::NotAGame => {
                let situational = match &self.study {
                    Some(study) => study.today().map_err(TurnError::Store)?,
                    None => None,
                };
                let system_prompt =
                    prompt::compose(&character, &memories, situational.as_deref());

                crate::observability::record_llm_call();
                let mut response = self
                    .model
                    .structured_chat(&system_prompt, &input.message)
                    .await
                    .map_err(|e| match e {
                        ProviderError::SchemaMismatch(msg) => TurnError::SchemaMismatch(msg),
                        other => TurnError::Provider(other.to_string()),
                    })?;
                response.emotion.validate()?;
                // The detector did not fire, so this turn carries no game
                // move regardless of what the model emitted
                response.game = None;
                response
            }
        };

        let voice_id = character
            .voice_id
            .as_deref()
            .ok_or(TurnError::VoiceNotConfigured)?;
        let voice = match self.synthesizer.synthesize(voice_id, &response.content).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                // Text and emotion are salvageable without audio
                tracing::warn!("voice synthesis failed, delivering without audio: {}", e);
                None
            }
        };

        let delivery = FinalDelivery::new(response.clone(), voice);

        // Scheduled only after the response is finalized so newly derived
        // facts cannot leak into the prompt that produced them
        let _ = self
            .writer
            .spawn_write(namespace, input.message, response.content);

        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::EmbeddingProvider;
    use crate::character::{Character, SledCharacters};
    use crate::schema::{Emotion, GameOutcome, Hand};
    use crate::voice::SynthesisError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        fn dims(&self) -> usize {
            2
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        fn dims(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Err(ProviderError::Api("embedding service down".to_string()))
        }
    }

    struct MockModel {
        calls: AtomicUsize,
    }

    impl MockModel {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for MockModel {
        fn name(&self) -> &str {
            "mock"
        }

        async fn structured_chat(
            &self,
            _system_prompt: &str,
            _user_message: &str,
        ) -> Result<StructuredResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StructuredResponse::assistant(
                "今日もいい天気だね",
                Emotion::new(0.6, 0.4, 0.0, 0.0),
            ))
        }
    }

    struct MismatchModel;

    #[async_trait]
    impl LanguageModel for MismatchModel {
        fn name(&self) -> &str {
            "mismatch"
        }

        async fn structured_chat(
            &self,
            _system_prompt: &str,
            _user_message: &str,
        ) -> Result<StructuredResponse, ProviderError> {
            Err(ProviderError::SchemaMismatch("not JSON".to_string()))
        }
    }

    struct MockSynth;

    #[async_trait]
    impl SpeechSynthesizer for MockSynth {
        async fn synthesize(
            &self,
            _voice_id: &str,
            _text: &str,
        ) -> Result<String, SynthesisError> {
            Ok("UklGRg==".to_string())
        }
    }

    struct FailingSynth;

    #[async_trait]
    impl SpeechSynthesizer for FailingSynth {
        async fn synthesize(
            &self,
            _voice_id: &str,
            _text: &str,
        ) -> Result<String, SynthesisError> {
            Err(SynthesisError::Service("tts down".to_string()))
        }
    }

    struct Fixture {
        orchestrator: TurnOrchestrator,
        memory: MemoryStore,
        _dir: tempfile::TempDir,
    }

    fn fixture_with(
        model: Arc<dyn LanguageModel>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        embedder: Arc<dyn EmbeddingProvider>,
        character: Character,
    ) -> Fixture {
        let dir = tempdir().unwrap();
        let db = Arc::new(sled::open(dir.path().join("test.db")).unwrap());
        let characters = SledCharacters::new(Arc::clone(&db));
        characters.upsert(&character).unwrap();
        let memory = MemoryStore::new(db, embedder);
        let orchestrator =
            TurnOrchestrator::new(Arc::new(characters), model, synthesizer, memory.clone());
        Fixture {
            orchestrator,
            memory,
            _dir: dir,
        }
    }

    fn public_character() -> Character {
        Character {
            id: "char-1".to_string(),
            name: "アンネリ".to_string(),
            personality: "明るい".to_string(),
            story: "海辺の町で育った".to_string(),
            is_public: true,
            owner_id: "owner-1".to_string(),
            voice_id: Some("voice-1".to_string()),
        }
    }

    fn input(message: &str) -> TurnInput {
        TurnInput {
            user_id: "user-1".to_string(),
            character_id: "char-1".to_string(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_game_turn_end_to_end() {
        let fx = fixture_with(
            Arc::new(MockModel::new()),
            Arc::new(MockSynth),
            Arc::new(StubEmbedder),
            public_character(),
        );

        // Empty memory, initiation + hand in one message
        let delivery = fx
            .orchestrator
            .run_turn(input("じゃんけんぽん！グー"))
            .await
            .unwrap();

        let ai_hand = delivery.game_ai_choice.expect("game hand populated");
        let result = delivery.game_result.expect("game result populated");
        assert_eq!(result, crate::game::outcome_of(Hand::Rock, ai_hand));
        assert!(delivery.content.contains("グー"));
        assert!(delivery.content.contains(ai_hand.as_japanese()));
        assert!(delivery.emotion.in_bounds());
        assert!(delivery.voice.is_some());
    }

    #[tokio::test]
    async fn test_plain_message_routes_to_llm() {
        let model = Arc::new(MockModel::new());
        let fx = fixture_with(
            model.clone(),
            Arc::new(MockSynth),
            Arc::new(StubEmbedder),
            public_character(),
        );

        let delivery = fx
            .orchestrator
            .run_turn(input("今日は何してた？"))
            .await
            .unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(delivery.content, "今日もいい天気だね");
        assert!(delivery.game_ai_choice.is_none());
        assert!(delivery.game_result.is_none());
    }

    #[tokio::test]
    async fn test_initiation_only_prompts_without_llm() {
        let model = Arc::new(MockModel::new());
        let fx = fixture_with(
            model.clone(),
            Arc::new(MockSynth),
            Arc::new(StubEmbedder),
            public_character(),
        );

        let delivery = fx
            .orchestrator
            .run_turn(input("じゃんけんしよう"))
            .await
            .unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert!(delivery.game_ai_choice.is_none());
        assert!(delivery.game_result.is_none());
        assert!(delivery.content.contains("何出す？"));
    }

    #[tokio::test]
    async fn test_two_turn_game_through_memory() {
        let fx = fixture_with(
            Arc::new(MockModel::new()),
            Arc::new(MockSynth),
            Arc::new(StubEmbedder),
            public_character(),
        );

        let first = fx
            .orchestrator
            .run_turn(input("じゃんけんしよう"))
            .await
            .unwrap();
        assert!(first.game_ai_choice.is_none());

        // Wait for the background memory write to land
        let ns = MemoryNamespace::new("user-1", "char-1");
        for _ in 0..50 {
            if fx.memory.count(&ns).unwrap() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(fx.memory.count(&ns).unwrap() > 0);

        // The stored reply carries the AwaitingChoice marker, so a bare hand
        // keyword now resolves the game
        let second = fx.orchestrator.run_turn(input("パー")).await.unwrap();
        assert!(second.game_ai_choice.is_some());
        assert!(second.game_result.is_some());
    }

    #[tokio::test]
    async fn test_private_character_looks_missing() {
        let mut character = public_character();
        character.is_public = false;
        let fx = fixture_with(
            Arc::new(MockModel::new()),
            Arc::new(MockSynth),
            Arc::new(StubEmbedder),
            character,
        );

        // user-1 is not owner-1
        let result = fx.orchestrator.run_turn(input("こんにちは")).await;
        assert!(matches!(result, Err(TurnError::CharacterNotFound)));
    }

    #[tokio::test]
    async fn test_owner_can_use_private_character() {
        let mut character = public_character();
        character.is_public = false;
        let fx = fixture_with(
            Arc::new(MockModel::new()),
            Arc::new(MockSynth),
            Arc::new(StubEmbedder),
            character,
        );

        let delivery = fx
            .orchestrator
            .run_turn(TurnInput {
                user_id: "owner-1".to_string(),
                character_id: "char-1".to_string(),
                message: "ただいま".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(delivery.role, "assistant");
    }

    #[tokio::test]
    async fn test_missing_voice_is_an_error() {
        let mut character = public_character();
        character.voice_id = None;
        let fx = fixture_with(
            Arc::new(MockModel::new()),
            Arc::new(MockSynth),
            Arc::new(StubEmbedder),
            character,
        );

        let result = fx.orchestrator.run_turn(input("こんにちは")).await;
        assert!(matches!(result, Err(TurnError::VoiceNotConfigured)));
    }

    #[tokio::test]
    async fn test_synthesis_failure_degrades_to_no_audio() {
        let fx = fixture_with(
            Arc::new(MockModel::new()),
            Arc::new(FailingSynth),
            Arc::new(StubEmbedder),
            public_character(),
        );

        let delivery = fx
            .orchestrator
            .run_turn(input("こんにちは"))
            .await
            .unwrap();
        assert!(delivery.voice.is_none());
        assert_eq!(delivery.content, "今日もいい天気だね");
    }

    #[tokio::test]
    async fn test_schema_mismatch_fails_the_turn() {
        let fx = fixture_with(
            Arc::new(MismatchModel),
            Arc::new(MockSynth),
            Arc::new(StubEmbedder),
            public_character(),
        );

        let result = fx.orchestrator.run_turn(input("こんにちは")).await;
        assert!(matches!(result, Err(TurnError::SchemaMismatch(_))));

        // No partial memory write for a failed turn
        let ns = MemoryNamespace::new("user-1", "char-1");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(fx.memory.count(&ns).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_write_failure_never_alters_delivery() {
        // Embeddings fail, so the background write fails on every attempt.
        // The game path avoids search-time embedding (empty namespace), and
        // the caller's delivery must be unaffected.
        let fx = fixture_with(
            Arc::new(MockModel::new()),
            Arc::new(MockSynth),
            Arc::new(FailingEmbedder),
            public_character(),
        );

        let delivery = fx
            .orchestrator
            .run_turn(input("じゃんけんぽん！チョキ"))
            .await
            .unwrap();

        assert_eq!(delivery.role, "assistant");
        assert!(delivery.game_ai_choice.is_some());
        assert!(delivery.voice.is_some());
        assert!(matches!(
            delivery.game_result,
            Some(GameOutcome::Win) | Some(GameOutcome::Lose) | Some(GameOutcome::Draw)
        ));
    }
}
