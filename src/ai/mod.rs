//! AI module - language model and embedding providers

pub mod gemini_client;
pub mod openai_embeddings;
pub mod provider;

pub use gemini_client::GeminiClient;
pub use openai_embeddings::OpenAiEmbeddings;
pub use provider::{EmbeddingProvider, LanguageModel, ProviderError};
