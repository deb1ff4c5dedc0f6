use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::loader::LoaderConfig;

/// Layered configuration: `config.toml`, then `config.<env>.toml`, then
/// `APP_*` variables (`__` nests), then the conventional credential variables.
pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> { Self::load_in(Path::new(".")) }

    /// Same as [`Config::load`] with the TOML files looked up under `base`.
    pub fn load_in(base: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(base.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment
            .merge(Env::prefixed("APP_").split("__"))
            .merge(Env::raw().only(&["OPENAI_API_KEY", "PINECONE_API_KEY", "PINECONE_ENVIRONMENT"]).map(|key| {
                match key.as_str().to_ascii_lowercase().as_str() {
                    "openai_api_key" => "openai.api_key".into(),
                    "pinecone_api_key" => "pinecone.api_key".into(),
                    _ => "pinecone.environment".into(),
                }
            }));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::config(format!("Failed to get '{}': {}", key, e)))
    }

    /// The typed view of every section, with defaults for anything unset.
    pub fn settings(&self) -> Result<AppConfig> {
        let settings: AppConfig = self.figment.extract().map_err(|e| Error::config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> Result<()> {
        if matches!(env, "prod" | "production") {
            let settings = self.settings()?;
            if settings.embedding.provider == EmbeddingProvider::Fake {
                return Err(Error::config("fake embeddings are not allowed in production"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub loader: LoaderConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub openai: OpenAiConfig,
    pub pinecone: PineconeConfig,
    pub store: StoreConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalConfig,
    pub chat: ChatConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.ingest.concurrency == 0 { return Err(Error::config("ingest.concurrency must be at least 1")); }
        if self.ingest.embed_batch_size == 0 || self.ingest.upsert_batch_size == 0 {
            return Err(Error::config("ingest batch sizes must be at least 1"));
        }
        if self.embedding.dimension == 0 { return Err(Error::config("embedding.dimension must be at least 1")); }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub docs_dir: String,
    pub lancedb_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self { Self { docs_dir: "data".to_string(), lancedb_dir: "data/indexes/lancedb".to_string() } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAi,
    Fake,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { provider: EmbeddingProvider::OpenAi, model: "text-embedding-ada-002".to_string(), dimension: 1536 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self { Self { api_key: None, base_url: "https://api.openai.com/v1".to_string(), timeout_secs: 60 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PineconeConfig {
    pub api_key: Option<String>,
    /// Serverless region; falls back to `us-east-1` when unset.
    pub environment: Option<String>,
    pub cloud: String,
    pub index_name: String,
    pub namespace: String,
    /// Data-plane host. When unset it is resolved through the control plane.
    pub host: Option<String>,
    pub control_url: String,
    pub metric: String,
    pub create_if_missing: bool,
    pub metadata_text_limit: usize,
    pub timeout_secs: u64,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            environment: None,
            cloud: "aws".to_string(),
            index_name: "chatbot-docs".to_string(),
            namespace: String::new(),
            host: None,
            control_url: "https://api.pinecone.io".to_string(),
            metric: "cosine".to_string(),
            create_if_missing: true,
            metadata_text_limit: 1000,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Pinecone,
    LanceDb,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub table_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self { Self { backend: StoreBackend::Pinecone, table_name: "documents".to_string() } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub concurrency: usize,
    pub embed_batch_size: usize,
    pub upsert_batch_size: usize,
    pub show_progress: bool,
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self { Self { concurrency: 4, embed_batch_size: 64, upsert_batch_size: 100, show_progress: true, timeout_secs: 120 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self { Self { top_k: 5, timeout_secs: 30 } }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert assistant for the documents in this knowledge base.

Use the provided context documents to answer questions accurately. If the context doesn't contain enough information to answer the question, say so clearly.

Always cite which document or section your answer comes from when possible.

Be helpful, professional, and concise in your responses.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_context_chunks: usize,
    pub system_prompt: String,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            max_context_chunks: 5,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout_secs: 60,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
