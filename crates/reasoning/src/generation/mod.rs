//! Chat completion against a hosted model.

mod parse;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::http::ApiClient;
use crate::retry::RetryPolicy;

pub const SYSTEM_MESSAGE: &str = "You are a neuroscience experimental design expert, skilled at \
extracting methodological insights from related research and designing new experimental protocols.";

/// Everything one completion attempt needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
  pub model: String,
  pub system: String,
  pub prompt: String,
  pub temperature: f32,
  pub max_tokens: u32,
}

/// One completion attempt against a backend. Implementations must not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionService: Send + Sync {
  async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// `POST {base}/chat/completions` on an OpenAI-compatible API.
pub struct OpenAiCompletionService {
  api: ApiClient,
}

impl OpenAiCompletionService {
  pub fn new(api: ApiClient) -> Self {
    Self { api }
  }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: [ChatMessage<'a>; 2],
  temperature: f32,
  max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'static str,
  content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
  message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
  content: Option<String>,
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
  async fn complete(&self, request: &CompletionRequest) -> Result<String> {
    let body = ChatRequest {
      model: &request.model,
      messages: [
        ChatMessage { role: "system", content: &request.system },
        ChatMessage { role: "user", content: &request.prompt },
      ],
      temperature: request.temperature,
      max_tokens: request.max_tokens,
    };

    let response: ChatResponse = self.api.post_json("/chat/completions", &body).await?;
    let content = response
      .choices
      .into_iter()
      .next()
      .and_then(|choice| choice.message.content)
      .ok_or_else(|| ServiceError::malformed("completion response contained no choices"))?;

    if content.trim().is_empty() {
      return Err(ServiceError::malformed("completion response was empty"));
    }
    Ok(content)
  }
}

/// Validating, retrying front for a [`CompletionService`].
pub struct GenerationClient {
  service: Arc<dyn CompletionService>,
  retry: RetryPolicy,
  max_tokens: u32,
}

impl GenerationClient {
  pub fn new(service: Arc<dyn CompletionService>, retry: RetryPolicy, max_tokens: u32) -> Self {
    Self { service, retry, max_tokens }
  }

  pub fn from_config(config: &Config) -> Result<Self> {
    let api = ApiClient::from_config(config)?;
    Ok(Self::new(
      Arc::new(OpenAiCompletionService::new(api)),
      config.retry_policy(),
      config.max_tokens,
    ))
  }

  /// Send `prompt` and return the model's raw reply text.
  pub async fn generate(&self, prompt: &str, model: &str, temperature: f32) -> Result<String> {
    if prompt.trim().is_empty() {
      return Err(ServiceError::validation("prompt must not be empty"));
    }
    if model.trim().is_empty() {
      return Err(ServiceError::validation("model name must not be empty"));
    }
    if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
      return Err(ServiceError::validation(format!(
        "temperature must be within [0, 1], got {temperature}"
      )));
    }

    let request = CompletionRequest {
      model: model.to_string(),
      system: SYSTEM_MESSAGE.to_string(),
      prompt: prompt.to_string(),
      temperature,
      max_tokens: self.max_tokens,
    };

    bentley::verbose!("requesting completion from {model} ({} prompt chars)", prompt.len());
    let reply = self.retry.run("generation", || self.service.complete(&request)).await?;
    bentley::verbose!("received {} chars from {model}", reply.len());
    Ok(reply)
  }
}
