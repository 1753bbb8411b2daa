//! The text-generation collaborator: a trait plus the OpenAI-backed
//! implementation. Responses are untrusted free text; extraction and
//! validation happen in the translator, never here.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("text generation failed: {0}")]
pub struct GenerationError(#[from] pub Box<dyn std::error::Error + Send + Sync>);

#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub model: String,
    /// 0.0 for deterministic output.
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Raw generated response.
#[derive(Debug, Clone)]
pub struct Generation {
    pub content: String,
}

/// A collaborator that turns a prompt into free text. One call per
/// translation; no retry policy lives at this layer.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, GenerationError>;
}

/// OpenAI chat-completion backend.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
}

impl OpenAiGenerator {
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }

    /// Build a client from `OPENAI_API_KEY`, loading `.env` if present.
    pub fn from_env() -> Result<Self, GenerationError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| GenerationError(Box::from("OPENAI_API_KEY must be set")))?;
        let config = OpenAIConfig::new().with_api_key(api_key);
        Ok(Self::new(Client::with_config(config)))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, GenerationError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&options.model)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| GenerationError(Box::new(e)))?,
            )])
            .temperature(options.temperature);
        if let Some(max_tokens) = options.max_tokens {
            args.max_tokens(max_tokens);
        }
        let request = args.build().map_err(|e| GenerationError(Box::new(e)))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| GenerationError(Box::new(e)))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| GenerationError(Box::from("no content in model response")))?;

        Ok(Generation { content })
    }
}
