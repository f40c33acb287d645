//! Runtime configuration.
//!
//! A [`Config`] is built once at process start and handed to every component
//! constructor. Sources are layered, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional YAML file (`--config` or `REASONING_CONFIG`)
//! 3. `REASONING_*` environment variables (plus `DASHSCOPE_API_KEY` / `OPENAI_API_KEY`)
//! 4. command line flags, applied by the binaries

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, ServiceError};
use crate::retry::{Backoff, RetryPolicy};

const DEFAULT_API_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Bearer credential for the hosted APIs. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
  pub fn new(key: impl Into<String>) -> Self {
    Self(key.into())
  }

  pub fn expose(&self) -> &str {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.trim().is_empty()
  }
}

impl fmt::Debug for ApiKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      f.write_str("ApiKey(<unset>)")
    } else {
      f.write_str("ApiKey(***)")
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
  Lancedb,
  Memory,
}

impl Default for StoreBackend {
  fn default() -> Self {
    if cfg!(feature = "lancedb") {
      StoreBackend::Lancedb
    } else {
      StoreBackend::Memory
    }
  }
}

impl FromStr for StoreBackend {
  type Err = ServiceError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_lowercase().as_str() {
      "lancedb" => Ok(StoreBackend::Lancedb),
      "memory" => Ok(StoreBackend::Memory),
      other => Err(ServiceError::validation(format!(
        "unknown store backend '{other}' (expected 'lancedb' or 'memory')"
      ))),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Base URL of the OpenAI-compatible API serving both embeddings and chat
  pub api_base_url: String,
  pub api_key: ApiKey,

  pub embedding_model: String,
  /// Requested (and expected) embedding dimension; `None` keeps the model default
  pub embedding_dimensions: Option<usize>,
  pub cache_embeddings: bool,

  pub generation_model: String,
  pub temperature: f32,
  pub max_tokens: u32,

  pub default_top_k: usize,
  /// Results scoring below this are dropped by the retriever
  pub min_similarity: Option<f32>,

  pub request_timeout_secs: u64,
  /// Total attempts per network call, the first one included
  pub max_retries: u32,
  pub backoff_base_ms: u64,
  pub backoff_cap_ms: u64,

  pub max_field_chars: usize,
  pub max_prompt_chars: usize,
  pub max_examples: usize,

  pub store_backend: StoreBackend,
  pub store_path: PathBuf,
  pub table_name: String,
  pub index_concurrency: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_base_url: DEFAULT_API_BASE_URL.to_string(),
      api_key: ApiKey::default(),
      embedding_model: "text-embedding-v4".to_string(),
      embedding_dimensions: None,
      cache_embeddings: true,
      generation_model: "qwen3-max".to_string(),
      temperature: 0.7,
      max_tokens: 3000,
      default_top_k: 5,
      min_similarity: None,
      request_timeout_secs: 60,
      max_retries: 3,
      backoff_base_ms: 1_000,
      backoff_cap_ms: 30_000,
      max_field_chars: 4_000,
      max_prompt_chars: 32_000,
      max_examples: 5,
      store_backend: StoreBackend::default(),
      store_path: default_store_path(),
      table_name: "neuroscience".to_string(),
      index_concurrency: 4,
    }
  }
}

impl Config {
  /// Load defaults, then the YAML file (if any), then the process environment.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let env_path = std::env::var("REASONING_CONFIG").ok().map(PathBuf::from);
    let mut config = match path.map(Path::to_path_buf).or(env_path) {
      Some(path) => Self::from_file(&path)?,
      None => Self::default(),
    };

    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_file(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path).map_err(|e| {
      ServiceError::validation(format!("cannot read config file {}: {e}", path.display()))
    })?;
    Self::from_yaml(&content)
      .map_err(|e| ServiceError::validation(format!("{}: {}", path.display(), e.message())))
  }

  pub fn from_yaml(content: &str) -> Result<Self> {
    serde_yaml::from_str(content)
      .map_err(|e| ServiceError::validation(format!("invalid config: {e}")))
  }

  /// Apply environment overrides through `lookup`, so tests need not touch the
  /// real process environment.
  pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
  where
    F: Fn(&str) -> Option<String>,
  {
    let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(key) = var("REASONING_API_KEY")
      .or_else(|| var("DASHSCOPE_API_KEY"))
      .or_else(|| var("OPENAI_API_KEY"))
    {
      self.api_key = ApiKey::new(key);
    }
    if let Some(url) = var("REASONING_API_BASE_URL") {
      self.api_base_url = url;
    }
    if let Some(model) = var("REASONING_EMBEDDING_MODEL") {
      self.embedding_model = model;
    }
    if let Some(value) = var("REASONING_EMBEDDING_DIMENSIONS") {
      self.embedding_dimensions = Some(parse_var("REASONING_EMBEDDING_DIMENSIONS", &value)?);
    }
    if let Some(value) = var("REASONING_CACHE_EMBEDDINGS") {
      self.cache_embeddings = parse_var("REASONING_CACHE_EMBEDDINGS", &value)?;
    }
    if let Some(model) = var("REASONING_GENERATION_MODEL") {
      self.generation_model = model;
    }
    if let Some(value) = var("REASONING_TEMPERATURE") {
      self.temperature = parse_var("REASONING_TEMPERATURE", &value)?;
    }
    if let Some(value) = var("REASONING_MAX_TOKENS") {
      self.max_tokens = parse_var("REASONING_MAX_TOKENS", &value)?;
    }
    if let Some(value) = var("REASONING_TOP_K") {
      self.default_top_k = parse_var("REASONING_TOP_K", &value)?;
    }
    if let Some(value) = var("REASONING_MIN_SIMILARITY") {
      self.min_similarity = Some(parse_var("REASONING_MIN_SIMILARITY", &value)?);
    }
    if let Some(value) = var("REASONING_TIMEOUT_SECS") {
      self.request_timeout_secs = parse_var("REASONING_TIMEOUT_SECS", &value)?;
    }
    if let Some(value) = var("REASONING_MAX_RETRIES") {
      self.max_retries = parse_var("REASONING_MAX_RETRIES", &value)?;
    }
    if let Some(value) = var("REASONING_STORE_BACKEND") {
      self.store_backend = value.parse()?;
    }
    if let Some(path) = var("REASONING_STORE_PATH") {
      self.store_path = PathBuf::from(path);
    }
    if let Some(table) = var("REASONING_TABLE") {
      self.table_name = table;
    }
    Ok(())
  }

  pub fn validate(&self) -> Result<()> {
    if !self.temperature.is_finite() || !(0.0..=1.0).contains(&self.temperature) {
      return Err(ServiceError::validation(format!(
        "temperature must be within [0, 1], got {}",
        self.temperature
      )));
    }
    if self.default_top_k == 0 {
      return Err(ServiceError::validation("default_top_k must be at least 1"));
    }
    if self.max_retries == 0 {
      return Err(ServiceError::validation("max_retries must be at least 1"));
    }
    if self.request_timeout_secs == 0 {
      return Err(ServiceError::validation("request_timeout_secs must be at least 1"));
    }
    if self.embedding_model.trim().is_empty() || self.generation_model.trim().is_empty() {
      return Err(ServiceError::validation("model names must not be empty"));
    }
    if self.api_base_url.trim().is_empty() {
      return Err(ServiceError::validation("api_base_url must not be empty"));
    }
    if self.embedding_dimensions == Some(0) {
      return Err(ServiceError::validation("embedding_dimensions must be positive"));
    }
    if self.max_field_chars == 0 || self.max_prompt_chars == 0 || self.max_examples == 0 {
      return Err(ServiceError::validation("prompt limits must be positive"));
    }
    if let Some(threshold) = self.min_similarity {
      if !(-1.0..=1.0).contains(&threshold) {
        return Err(ServiceError::validation("min_similarity must be within [-1, 1]"));
      }
    }
    if self.index_concurrency == 0 {
      return Err(ServiceError::validation("index_concurrency must be at least 1"));
    }
    Ok(())
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy::new(
      self.max_retries,
      self.request_timeout(),
      Backoff::new(
        Duration::from_millis(self.backoff_base_ms),
        Duration::from_millis(self.backoff_cap_ms),
      ),
    )
  }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
  value
    .trim()
    .parse()
    .map_err(|_| ServiceError::validation(format!("{name} has an invalid value '{value}'")))
}

/// `~/.reasoning/store`, falling back to `/tmp` without a home directory
fn default_store_path() -> PathBuf {
  dirs::home_dir()
    .unwrap_or_else(|| Path::new("/tmp").to_path_buf())
    .join(".reasoning")
    .join("store")
}
