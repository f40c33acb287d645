//! Text to vector, through a hosted embedding API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::http::ApiClient;
use crate::retry::RetryPolicy;

/// Cached vectors kept per client before the cache stops growing
const CACHE_CAPACITY: usize = 1024;

/// One embedding attempt against a backend. Implementations must not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingService: Send + Sync {
  async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// `POST {base}/embeddings` on an OpenAI-compatible API.
pub struct OpenAiEmbeddingService {
  api: ApiClient,
  model: String,
  dimensions: Option<usize>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
  model: &'a str,
  input: &'a str,
  encoding_format: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
  data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
  embedding: Vec<f32>,
}

impl OpenAiEmbeddingService {
  pub fn new(api: ApiClient, model: impl Into<String>, dimensions: Option<usize>) -> Self {
    Self { api, model: model.into(), dimensions }
  }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingService {
  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    let request = EmbeddingRequest {
      model: &self.model,
      input: text,
      encoding_format: "float",
      dimensions: self.dimensions,
    };

    let response: EmbeddingResponse = self.api.post_json("/embeddings", &request).await?;
    response
      .data
      .into_iter()
      .next()
      .map(|data| data.embedding)
      .ok_or_else(|| ServiceError::malformed("embedding response contained no data"))
  }
}

/// Validating, retrying, optionally caching front for an [`EmbeddingService`].
pub struct EmbeddingClient {
  service: Arc<dyn EmbeddingService>,
  retry: RetryPolicy,
  dimensions: Option<usize>,
  cache: Option<Mutex<HashMap<String, Vec<f32>>>>,
}

impl EmbeddingClient {
  pub fn new(service: Arc<dyn EmbeddingService>, retry: RetryPolicy) -> Self {
    Self { service, retry, dimensions: None, cache: None }
  }

  /// Production client for the configured hosted model.
  pub fn from_config(config: &Config) -> Result<Self> {
    let api = ApiClient::from_config(config)?;
    let service = OpenAiEmbeddingService::new(
      api,
      config.embedding_model.clone(),
      config.embedding_dimensions,
    );

    Ok(
      Self::new(Arc::new(service), config.retry_policy())
        .with_cache(config.cache_embeddings)
        .expect_dimensions(config.embedding_dimensions),
    )
  }

  /// Remember vectors by exact input text.
  pub fn with_cache(mut self, enabled: bool) -> Self {
    self.cache = enabled.then(|| Mutex::new(HashMap::new()));
    self
  }

  /// Reject vectors whose length differs from `dimensions`.
  pub fn expect_dimensions(mut self, dimensions: Option<usize>) -> Self {
    self.dimensions = dimensions;
    self
  }

  pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    if text.trim().is_empty() {
      return Err(ServiceError::validation("text to embed must not be empty"));
    }

    if let Some(vector) = self.cached(text) {
      bentley::verbose!("embedding cache hit ({} chars)", text.len());
      return Ok(vector);
    }

    let vector = self.retry.run("embedding", || self.service.embed(text)).await?;
    self.check(&vector)?;
    self.remember(text, &vector);
    Ok(vector)
  }

  fn check(&self, vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
      return Err(ServiceError::malformed("embedding service returned an empty vector"));
    }
    if let Some(expected) = self.dimensions {
      if vector.len() != expected {
        return Err(ServiceError::malformed(format!(
          "expected a {expected}-dimensional embedding, got {}",
          vector.len()
        )));
      }
    }
    if vector.iter().any(|value| !value.is_finite()) {
      return Err(ServiceError::malformed("embedding contains non-finite values"));
    }
    Ok(())
  }

  fn cached(&self, text: &str) -> Option<Vec<f32>> {
    let cache = self.cache.as_ref()?.lock().ok()?;
    cache.get(text).cloned()
  }

  fn remember(&self, text: &str, vector: &[f32]) {
    let Some(cache) = &self.cache else { return };
    if let Ok(mut cache) = cache.lock() {
      if cache.len() < CACHE_CAPACITY {
        cache.insert(text.to_string(), vector.to_vec());
      }
    }
  }
}
