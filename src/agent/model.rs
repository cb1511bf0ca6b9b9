//! Model client with ordered fallback across model identifiers.

use super::conversation::{Conversation, Message, Role};
use crate::config::ModelSettings;
use crate::error::{QuizError, Result};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// A single JSON-mode chat completion against one model.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Return the raw text of the first choice.
    ///
    /// Quota and availability problems must be reported as
    /// [`QuizError::RateLimited`] or [`QuizError::ModelUnavailable`] so the
    /// caller can fall back to the next model.
    async fn complete(&self, model: &str, messages: &[Message], temperature: f32) -> Result<String>;
}

/// Decision oracle that scans models in order until one answers.
#[derive(Clone)]
pub struct ModelClient {
    backend: Arc<dyn ChatBackend>,
    models: Vec<String>,
    temperature: f32,
}

impl ModelClient {
    pub fn new(backend: Arc<dyn ChatBackend>, models: Vec<String>, temperature: f32) -> Self {
        Self {
            backend,
            models,
            temperature,
        }
    }

    /// Build the production client for an OpenAI-compatible endpoint.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        if settings.models.is_empty() {
            return Err(QuizError::Config("model.models must not be empty".to_string()));
        }
        let backend = OpenAiChat::new(crate::openai::create_client(settings)?, settings.request_timeout());
        Ok(Self::new(
            Arc::new(backend),
            settings.models.clone(),
            settings.temperature,
        ))
    }

    /// Ask for the next decision. Never mutates the conversation.
    #[instrument(skip(self, conversation), fields(messages = conversation.messages().len()))]
    pub async fn decide(&self, conversation: &Conversation) -> Result<String> {
        for model in &self.models {
            match self
                .backend
                .complete(model, conversation.messages(), self.temperature)
                .await
            {
                Ok(content) => {
                    debug!("Model {} answered with {} chars", model, content.len());
                    return Ok(content);
                }
                Err(e) if e.is_fallback_eligible() => {
                    warn!("{}; trying next model", e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(QuizError::AllModelsExhausted {
            tried: self.models.len(),
        })
    }
}

/// [`ChatBackend`] over `async-openai`.
pub struct OpenAiChat {
    client: Client<OpenAIConfig>,
    timeout: Duration,
}

impl OpenAiChat {
    pub fn new(client: Client<OpenAIConfig>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn complete(&self, model: &str, messages: &[Message], temperature: f32) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(to_request_messages(messages)?)
            .temperature(temperature)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| QuizError::OpenAI(e.to_string()))?;

        info!("Querying {}", model);

        let response = match tokio::time::timeout(self.timeout, self.client.chat().create(request)).await {
            Ok(result) => result.map_err(|e| classify_openai_error(model, e))?,
            Err(_) => {
                return Err(QuizError::ModelUnavailable {
                    model: model.to_string(),
                    message: format!("timed out after {}s", self.timeout.as_secs()),
                })
            }
        };

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| QuizError::OpenAI(format!("Empty response from {}", model)))
    }
}

fn to_request_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>> {
    messages
        .iter()
        .map(|m| {
            let message: ChatCompletionRequestMessage = match m.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(|e| QuizError::OpenAI(e.to_string()))?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(|e| QuizError::OpenAI(e.to_string()))?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(|e| QuizError::OpenAI(e.to_string()))?
                    .into(),
            };
            Ok(message)
        })
        .collect()
}

fn classify_openai_error(model: &str, error: OpenAIError) -> QuizError {
    match &error {
        OpenAIError::ApiError(api) => classify_api_error(
            model,
            api.code.as_deref(),
            api.r#type.as_deref(),
            &api.message,
        ),
        OpenAIError::Reqwest(e) => match e.status().map(|s| s.as_u16()) {
            Some(429) => QuizError::RateLimited {
                model: model.to_string(),
                message: e.to_string(),
            },
            Some(404) | Some(503) => QuizError::ModelUnavailable {
                model: model.to_string(),
                message: e.to_string(),
            },
            _ => QuizError::OpenAI(error.to_string()),
        },
        _ => QuizError::OpenAI(error.to_string()),
    }
}

/// Sort an API error into quota, availability, or anything else.
fn classify_api_error(model: &str, code: Option<&str>, kind: Option<&str>, message: &str) -> QuizError {
    let code = code.unwrap_or_default().to_lowercase();
    let kind = kind.unwrap_or_default().to_lowercase();
    let lower = message.to_lowercase();

    let rate_limited = code.contains("rate_limit")
        || kind.contains("rate_limit")
        || kind == "tokens"
        || kind == "requests"
        || code == "insufficient_quota"
        || kind == "insufficient_quota"
        || lower.contains("rate limit")
        || lower.contains("quota");

    let unavailable = code == "model_not_found"
        || code == "model_decommissioned"
        || code == "model_not_available"
        || kind == "service_unavailable"
        || lower.contains("over capacity")
        || lower.contains("does not exist")
        || lower.contains("decommissioned");

    if rate_limited {
        QuizError::RateLimited {
            model: model.to_string(),
            message: message.to_string(),
        }
    } else if unavailable {
        QuizError::ModelUnavailable {
            model: model.to_string(),
            message: message.to_string(),
        }
    } else {
        QuizError::OpenAI(format!("{}: {}", model, message))
    }
}
