//! Chat-completion clients used to synthesize answers.
//!
//! Both adapters send the same fixed system instruction, temperature, and token limit, and
//! return the trimmed text of the first choice. Failures come back as [`LlmError`] so callers
//! can tell a transport problem from rejected credentials or a misbehaving provider.

use crate::config::{Config, LlmProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Instruction sent as the system message of every completion.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers policy-related queries from documents.";
/// Sampling temperature for answers.
pub const TEMPERATURE: f32 = 0.3;
/// Completion token limit for answers.
pub const MAX_TOKENS: u32 = 700;

const LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider could not be reached or the request timed out.
    #[error("LLM Error: transport failure: {0}")]
    Transport(String),
    /// The provider rejected our credentials.
    #[error("LLM Error: authentication failed: {0}")]
    Authentication(String),
    /// The provider answered with a non-success status.
    #[error("LLM Error: provider returned {status}: {body}")]
    Upstream {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Response body, for diagnostics.
        body: String,
    },
    /// The provider answered successfully but the body was not usable.
    #[error("LLM Error: malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by completion providers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete `prompt` and return the trimmed answer text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn chat_messages(prompt: &str) -> Vec<ChatMessage<'_>> {
    vec![
        ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT,
        },
        ChatMessage {
            role: "user",
            content: prompt,
        },
    ]
}

fn build_http_client(agent: &str) -> Result<Client, LlmError> {
    Client::builder()
        .user_agent(agent)
        .timeout(LLM_TIMEOUT)
        .build()
        .map_err(|error| LlmError::Transport(error.to_string()))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(LlmError::Authentication(format!("{status}: {body}")));
    }
    Err(LlmError::Upstream { status, body })
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChatClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    /// Build a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(base_url: String, api_key: String, model: String) -> Result<Self, LlmError> {
        Ok(Self {
            http: build_http_client("docqa/llm")?,
            base_url,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = OpenAiChatRequest {
            model: &self.model,
            messages: chat_messages(prompt),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.api_key.trim())
            .json(&request)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;
        let response = check_status(response).await?;

        let body: OpenAiChatResponse = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".into()))?;

        tracing::debug!(model = %self.model, chars = content.len(), "Completion received");
        Ok(content.trim().to_string())
    }
}

/// Client for the Ollama `/api/chat` endpoint.
pub struct OllamaChatClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaChatClient {
    /// Build a client targeting a local Ollama runtime.
    pub fn new(base_url: String, model: String) -> Result<Self, LlmError> {
        Ok(Self {
            http: build_http_client("docqa/llm")?,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl LlmClient for OllamaChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages: chat_messages(prompt),
            stream: false,
            options: OllamaOptions {
                temperature: TEMPERATURE,
                num_predict: MAX_TOKENS,
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                LlmError::Transport(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;
        let response = check_status(response).await?;

        let body: OllamaChatResponse = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;
        if !body.done {
            return Err(LlmError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.message.content.trim().to_string())
    }
}

/// Build the completion client selected by configuration.
pub fn get_llm_client(config: &Config) -> Result<Box<dyn LlmClient>, LlmError> {
    let client: Box<dyn LlmClient> = match config.llm_provider {
        LlmProvider::OpenAI => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| LlmError::Authentication("OPENAI_API_KEY is not set".into()))?;
            Box::new(OpenAiChatClient::new(
                config.openai_base_url.clone(),
                api_key,
                config.llm_model.clone(),
            )?)
        }
        LlmProvider::Ollama => Box::new(OllamaChatClient::new(
            config.ollama_url.clone(),
            config.llm_model.clone(),
        )?),
    };
    tracing::info!(provider = ?config.llm_provider, model = %config.llm_model, "LLM client initialized");
    Ok(client)
}
