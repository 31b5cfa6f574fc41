//! Shared server state
//! Constructs every collaborator once and hands it to request handlers -
//! explicit context instead of module-level globals

use std::sync::Arc;

use anyhow::Result;
use sled::Db;

use crate::ai::{GeminiClient, OpenAiEmbeddings};
use crate::character::SledCharacters;
use crate::config::AppConfig;
use crate::memory::MemoryStore;
use crate::orchestrator::TurnOrchestrator;
use crate::session::{SessionProvider, SledSessions};
use crate::study::StudyLog;
use crate::transcribe::{SttClient, Transcriber};
use crate::voice::TtsClient;

pub struct AppContext {
    pub sessions: Arc<dyn SessionProvider>,
    pub transcriber: Arc<dyn Transcriber>,
    pub orchestrator: TurnOrchestrator,
}

impl AppContext {
    /// Wire the full collaborator graph from configuration. The sled
    /// database is opened once and shared by every store.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let db: Arc<Db> = Arc::new(sled::open(&config.db_path)?);

        let embedder = Arc::new(
            OpenAiEmbeddings::with_model(
                &config.embeddings_api_key,
                &config.embedding_model,
                config
                    .embeddings_base_url
                    .as_deref()
                    .unwrap_or("https://api.openai.com/v1"),
                config.embedding_dims,
            )
            .map_err(|e| anyhow::anyhow!("embeddings client: {}", e))?,
        );
        let memory = MemoryStore::new(Arc::clone(&db), embedder);

        let model = Arc::new(GeminiClient::with_model(
            config.gemini_api_key.clone(),
            &config.gemini_model,
        ));
        let synthesizer = Arc::new(
            TtsClient::new(&config.tts_base_url)
                .map_err(|e| anyhow::anyhow!("tts client: {}", e))?,
        );
        let transcriber = Arc::new(
            SttClient::new(&config.stt_base_url)
                .map_err(|e| anyhow::anyhow!("stt client: {}", e))?,
        );

        let characters = Arc::new(SledCharacters::new(Arc::clone(&db)));
        let study = Arc::new(StudyLog::new(Arc::clone(&db)));
        let sessions = Arc::new(SledSessions::new(db));

        let orchestrator =
            TurnOrchestrator::new(characters, model, synthesizer, memory).with_study(study);

        Ok(Self {
            sessions,
            transcriber,
            orchestrator,
        })
    }
}
