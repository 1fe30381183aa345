use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{OpenAIConfig, PROVIDER, describe_error_response, describe_send_error};
use crate::config::DEFAULT_CHAT_MODEL;
use crate::error::{RagError, Result};
use crate::generator::{ChatMessage, ChatModel};

fn service_error(message: impl Into<String>) -> RagError {
    RagError::GenerationService { provider: PROVIDER.into(), message: message.into() }
}

/// A [`ChatModel`] backed by the OpenAI chat completions API.
///
/// Calls `POST {base_url}/chat/completions` without streaming and returns
/// the first choice's content.
pub struct OpenAIChatModel {
    client: reqwest::Client,
    config: OpenAIConfig,
    model: String,
}

impl OpenAIChatModel {
    /// Create a client for `gpt-3.5-turbo`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationService`] if the API key is empty or the
    /// HTTP client cannot be built.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = config.http_client().map_err(service_error)?;
        Ok(Self { client, config, model: DEFAULT_CHAT_MODEL.into() })
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, messages = messages.len(), "chat completion");

        let request_body = CompletionRequest { model: &self.model, messages, temperature };

        let response = self
            .client
            .post(self.config.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "chat request failed");
                service_error(describe_send_error(&e, self.config.timeout))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(provider = PROVIDER, %status, "chat API error");
            return Err(service_error(describe_error_response(response).await));
        }

        let body: CompletionResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse chat response");
            service_error(format!("failed to parse response: {e}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| service_error("API returned no completion"))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
