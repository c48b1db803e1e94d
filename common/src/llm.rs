//! LLM chat-completion and embedding access, abstracted behind a trait so
//! ingestion/retrieval pipeline tests don't need a live API key. Grounded in
//! the teacher's direct `async_openai::Client` usage
//! (`ingestion-pipeline::enricher::IngestionEnricher::perform_analysis`,
//! `common::utils::embedding::generate_embedding_with_params`), generalized
//! into a seam and pointed at OpenRouter via `OpenAIConfig::with_api_base`.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs, ResponseFormat,
    ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;

pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

pub enum ChatRole {
    System,
    User,
}

/// Seam between the pipeline logic and whichever chat/embedding backend is
/// configured. The only production implementation is `OpenRouterClient`.
/// Kept object-safe (no generic methods) so callers can hold
/// `Arc<dyn LlmClient>` in shared application state; callers parse the
/// returned JSON themselves via `serde_json::from_value`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Requests a JSON-schema-constrained chat completion and returns the
    /// parsed response content.
    async fn chat_json(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        schema_name: &str,
        schema: Value,
    ) -> Result<Value, AppError>;

    async fn embed_batch(&self, model: &str, inputs: &[String], dimensions: u32) -> Result<Vec<Vec<f32>>, AppError>;
}

pub struct OpenRouterClient {
    client: async_openai::Client<OpenAIConfig>,
}

impl OpenRouterClient {
    #[must_use]
    pub fn new(api_key: &str, base_url: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: async_openai::Client::with_config(config),
        }
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_json(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        schema_name: &str,
        schema: Value,
    ) -> Result<Value, AppError> {
        let rendered = messages
            .into_iter()
            .map(|message| match message.role {
                ChatRole::System => ChatCompletionRequestSystemMessage::from(message.content).into(),
                ChatRole::User => ChatCompletionRequestUserMessage::from(message.content).into(),
            })
            .collect::<Vec<_>>();

        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: schema_name.to_string(),
                schema: Some(schema),
                strict: Some(true),
            },
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(rendered)
            .response_format(response_format)
            .build()?;

        let response = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or_else(|| AppError::LLMParsing("no content in LLM response".to_string()))?;

        serde_json::from_str(content)
            .map_err(|err| AppError::LLMParsing(format!("failed to parse LLM response: {err}")))
    }

    async fn embed_batch(&self, model: &str, inputs: &[String], dimensions: u32) -> Result<Vec<Vec<f32>>, AppError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(model)
            .input(inputs)
            .dimensions(dimensions)
            .build()?;

        let response = self.client.embeddings().create(request).await?;
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod fake {
    use super::{async_trait, AppError, ChatMessage, LlmClient, Value};
    use std::sync::Mutex;

    /// Returns a canned JSON chat response and deterministic embeddings.
    /// Used by ingestion/retrieval tests that exercise pipeline wiring
    /// without an LLM API key.
    pub struct FakeLlmClient {
        pub chat_response: Mutex<Option<String>>,
    }

    impl FakeLlmClient {
        #[must_use]
        pub fn with_chat_response(response: impl Into<String>) -> Self {
            Self {
                chat_response: Mutex::new(Some(response.into())),
            }
        }
    }

    #[async_trait]
    impl LlmClient for FakeLlmClient {
        async fn chat_json(
            &self,
            _model: &str,
            _messages: Vec<ChatMessage>,
            _schema_name: &str,
            _schema: Value,
        ) -> Result<Value, AppError> {
            let raw = self
                .chat_response
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| AppError::LLMParsing("fake client has no canned response".to_string()))?;
            serde_json::from_str(&raw).map_err(|err| AppError::LLMParsing(err.to_string()))
        }

        async fn embed_batch(&self, _model: &str, inputs: &[String], dimensions: u32) -> Result<Vec<Vec<f32>>, AppError> {
            Ok(inputs
                .iter()
                .map(|input| {
                    let seed = input.len() as f32;
                    vec![seed; dimensions as usize]
                })
                .collect())
        }
    }
}
