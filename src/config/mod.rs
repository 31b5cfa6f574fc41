//! Application configuration
//! Optional TOML file under the user config directory, with environment
//! variables taking precedence over file values

use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;

const DEFAULT_PORT: u16 = 7860;
const DEFAULT_EMBEDDING_DIMS: usize = 1536;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub embeddings_api_key: String,
    pub embeddings_base_url: Option<String>,
    pub embedding_model: String,
    pub embedding_dims: usize,
    pub tts_base_url: String,
    pub stt_base_url: String,
    pub enable_cors: bool,
}

/// On-disk configuration file shape. Every field is optional so a partial
/// file only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub voice: VoiceSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default)]
    pub disable_cors: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiSection {
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub gemini_model: Option<String>,
    #[serde(default)]
    pub embeddings_api_key: Option<String>,
    #[serde(default)]
    pub embeddings_base_url: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub embedding_dims: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceSection {
    #[serde(default)]
    pub tts_base_url: Option<String>,
    #[serde(default)]
    pub stt_base_url: Option<String>,
}

impl FileConfig {
    /// Load the config file if one exists; missing file is not an error.
    fn load() -> Self {
        let path = Self::path();
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<FileConfig>(&contents) {
                Ok(file) => {
                    tracing::info!("Loaded config from {:?}", path);
                    file
                }
                Err(e) => {
                    tracing::warn!("Ignoring malformed config file {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Could not read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    fn path() -> PathBuf {
        if let Ok(path) = std::env::var("KIZUNA_CONFIG") {
            return PathBuf::from(path);
        }
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("kizuna");
        path.push("config.toml");
        path
    }
}

impl AppConfig {
    /// Build configuration from the optional TOML file plus environment
    /// variables. Environment variables win over file values.
    pub fn from_env() -> Result<Self> {
        Self::resolve(FileConfig::load())
    }

    fn resolve(file: FileConfig) -> Result<Self> {
        let db_path = match env_var("KIZUNA_DB_PATH").or(file.server.db_path) {
            Some(path) => PathBuf::from(path),
            None => Self::default_db_path()?,
        };

        Ok(Self {
            host: env_var("KIZUNA_HOST")
                .or(file.server.host)
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: env_var("KIZUNA_PORT")
                .and_then(|p| p.parse().ok())
                .or(file.server.port)
                .unwrap_or(DEFAULT_PORT),
            db_path,
            gemini_api_key: env_var("GEMINI_API_KEY")
                .or(file.ai.gemini_api_key)
                .unwrap_or_default(),
            gemini_model: env_var("GEMINI_MODEL")
                .or(file.ai.gemini_model)
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            embeddings_api_key: env_var("OPENAI_API_KEY")
                .or(file.ai.embeddings_api_key)
                .unwrap_or_default(),
            embeddings_base_url: env_var("OPENAI_BASE_URL").or(file.ai.embeddings_base_url),
            embedding_model: env_var("EMBEDDING_MODEL")
                .or(file.ai.embedding_model)
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            embedding_dims: env_var("EMBEDDING_DIMS")
                .and_then(|d| d.parse().ok())
                .or(file.ai.embedding_dims)
                .unwrap_or(DEFAULT_EMBEDDING_DIMS),
            tts_base_url: env_var("TTS_BASE_URL")
                .or(file.voice.tts_base_url)
                .unwrap_or_else(|| "http://localhost:5000".to_string()),
            stt_base_url: env_var("STT_BASE_URL")
                .or(file.voice.stt_base_url)
                .unwrap_or_else(|| "http://localhost:5001".to_string()),
            enable_cors: if std::env::var("KIZUNA_DISABLE_CORS").is_ok() {
                false
            } else {
                !file.server.disable_cors.unwrap_or(false)
            },
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let mut path =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("No config directory found"))?;
        path.push("kizuna");
        path.push("kizuna.db");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(path)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
