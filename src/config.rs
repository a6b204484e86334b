use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_QDRANT_URL: &str = "http://127.0.0.1:6333";
const DEFAULT_COLLECTION: &str = "pdf-query-index";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_WEBHOOK_SECRET: &str = "default_secret";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the question-answering server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Token expected in the `Authorization: Bearer` header of the protected endpoint.
    pub api_bearer_token: String,
    /// Backend holding chunk embeddings.
    pub vector_store: VectorStoreKind,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for chunk storage.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the local Ollama runtime.
    pub ollama_url: String,
    /// Completion backend used to synthesize answers.
    pub llm_provider: LlmProvider,
    /// Completion model identifier.
    pub llm_model: String,
    /// API key for OpenAI-compatible endpoints.
    pub openai_api_key: Option<String>,
    /// Base URL for OpenAI-compatible endpoints.
    pub openai_base_url: String,
    /// Window length, in characters, of each chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of neighbours requested from the vector store per question.
    pub search_top_k: usize,
    /// Number of retrieved chunks placed into the prompt.
    pub prompt_max_chunks: usize,
    /// Byte budget for chunk text stored as vector metadata.
    pub metadata_max_bytes: usize,
    /// Webhook target configured at start, if any.
    pub webhook_url: Option<String>,
    /// Shared secret sent in `X-Webhook-Secret`.
    pub webhook_secret: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime serving a sentence-embedding model.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic byte-hashing embeddings; no network access.
    Hash,
}

/// Supported chat-completion backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI or any OpenAI-compatible server.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

/// Where chunk vectors live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// Hosted Qdrant collection.
    Qdrant,
    /// Process-local index, dropped with the server.
    Memory,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            api_bearer_token: load_env("API_BEARER_TOKEN")?,
            vector_store: parse_optional("VECTOR_STORE")?.unwrap_or(VectorStoreKind::Qdrant),
            qdrant_url: load_env_or("QDRANT_URL", DEFAULT_QDRANT_URL),
            qdrant_collection_name: load_env_or("QDRANT_COLLECTION_NAME", DEFAULT_COLLECTION),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: parse_optional("EMBEDDING_PROVIDER")?
                .unwrap_or(EmbeddingProvider::Ollama),
            embedding_model: load_env_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            embedding_dimension: parse_optional("EMBEDDING_DIMENSION")?
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            ollama_url: load_env_or("OLLAMA_URL", DEFAULT_OLLAMA_URL),
            llm_provider: parse_optional("LLM_PROVIDER")?.unwrap_or(LlmProvider::OpenAI),
            llm_model: load_env_or("LLM_MODEL", DEFAULT_LLM_MODEL),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            chunk_size: parse_optional("CHUNK_SIZE")?.unwrap_or(300),
            chunk_overlap: parse_optional("CHUNK_OVERLAP")?.unwrap_or(50),
            search_top_k: parse_optional("SEARCH_TOP_K")?.unwrap_or(5),
            prompt_max_chunks: parse_optional("PROMPT_MAX_CHUNKS")?.unwrap_or(3),
            metadata_max_bytes: parse_optional("METADATA_MAX_BYTES")?.unwrap_or(40_960),
            webhook_url: load_env_optional("WEBHOOK_URL"),
            webhook_secret: load_env_or("WEBHOOK_SECRET", DEFAULT_WEBHOOK_SECRET),
            server_port: parse_optional("SERVER_PORT")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidValue("CHUNK_OVERLAP".into()));
        }
        if self.search_top_k == 0 {
            return Err(ConfigError::InvalidValue("SEARCH_TOP_K".into()));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.api_bearer_token.trim().is_empty() {
            return Err(ConfigError::MissingVariable("API_BEARER_TOKEN".into()));
        }
        Ok(())
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for VectorStoreKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        vector_store = ?config.vector_store,
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        llm_provider = ?config.llm_provider,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        api_bearer_token: "test-token".into(),
        vector_store: VectorStoreKind::Memory,
        qdrant_url: DEFAULT_QDRANT_URL.into(),
        qdrant_collection_name: "test-collection".into(),
        qdrant_api_key: None,
        embedding_provider: EmbeddingProvider::Hash,
        embedding_model: "hash".into(),
        embedding_dimension: 64,
        ollama_url: DEFAULT_OLLAMA_URL.into(),
        llm_provider: LlmProvider::OpenAI,
        llm_model: "test-model".into(),
        openai_api_key: Some("sk-test".into()),
        openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
        chunk_size: 300,
        chunk_overlap: 50,
        search_top_k: 5,
        prompt_max_chunks: 3,
        metadata_max_bytes: 40_960,
        webhook_url: None,
        webhook_secret: DEFAULT_WEBHOOK_SECRET.into(),
        server_port: None,
    }
}
