//! Retrieve, prompt, generate, parse.
//!
//! Each call to [`Pipeline::run`] is one independent request with its own
//! [`RequestState`]. A request either ends in [`Outcome::Done`] with a complete
//! chain or in [`Outcome::Failed`] naming the stage that failed; partial chains
//! are never returned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::error::{ErrorKind, ServiceError};
use crate::generation::GenerationClient;
use crate::model::{ReasoningChain, RetrievedRecord};
use crate::prompt::PromptBuilder;
use crate::retriever::Retriever;
use crate::store::VectorStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Idle,
  Retrieving,
  Generating,
  Parsing,
  Done,
  Failed,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::Idle => "idle",
      Stage::Retrieving => "retrieving",
      Stage::Generating => "generating",
      Stage::Parsing => "parsing",
      Stage::Done => "done",
      Stage::Failed => "failed",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Stage::Done | Stage::Failed)
  }

  /// Legal transitions: the happy path in order, or any live stage to `Failed`.
  pub fn can_advance_to(&self, next: Stage) -> bool {
    matches!(
      (self, next),
      (Stage::Idle, Stage::Retrieving)
        | (Stage::Retrieving, Stage::Generating)
        | (Stage::Generating, Stage::Parsing)
        | (Stage::Parsing, Stage::Done)
    ) || (!self.is_terminal() && next == Stage::Failed)
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A component error tagged with the stage it happened in.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{stage} failed: {error}")]
pub struct PipelineFailure {
  pub stage: Stage,
  pub error: ServiceError,
}

/// Stage machine of a single request.
#[derive(Debug)]
pub struct RequestState {
  stage: Stage,
  history: Vec<Stage>,
}

impl Default for RequestState {
  fn default() -> Self {
    Self::new()
  }
}

impl RequestState {
  pub fn new() -> Self {
    Self { stage: Stage::Idle, history: vec![Stage::Idle] }
  }

  pub fn stage(&self) -> Stage {
    self.stage
  }

  pub fn history(&self) -> &[Stage] {
    &self.history
  }

  pub fn advance(&mut self, next: Stage) {
    debug_assert!(
      self.stage.can_advance_to(next),
      "illegal stage transition {} -> {next}",
      self.stage
    );
    bentley::verbose!("{} -> {next}", self.stage);
    self.stage = next;
    self.history.push(next);
  }

  /// Move to `Failed`, remembering where the request was.
  pub fn fail(&mut self, error: ServiceError) -> PipelineFailure {
    let stage = self.stage;
    self.advance(Stage::Failed);
    PipelineFailure { stage, error }
  }
}

/// Input of one request. Unset overrides fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
  pub question: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub top_k: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
}

impl GenerateRequest {
  pub fn new(question: impl Into<String>) -> Self {
    Self { question: question.into(), ..Self::default() }
  }
}

/// A retrieved study as cited by a generated chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
  pub id: String,
  pub title: String,
  pub year: Option<u32>,
  pub citation_count: u64,
  pub similarity: f32,
}

impl From<&RetrievedRecord> for Reference {
  fn from(result: &RetrievedRecord) -> Self {
    let provenance = &result.record.provenance;
    Self {
      id: result.record.id.clone(),
      title: provenance.title.clone(),
      year: provenance.year,
      citation_count: provenance.citation_count,
      similarity: result.score,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedChain {
  pub question: String,
  pub reasoning_chain: ReasoningChain,
  pub references: Vec<Reference>,
  pub model: String,
  pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
  pub error_kind: ErrorKind,
  pub stage: Stage,
  pub message: String,
}

impl From<PipelineFailure> for FailureReport {
  fn from(failure: PipelineFailure) -> Self {
    Self {
      error_kind: failure.error.kind(),
      stage: failure.stage,
      message: failure.error.to_string(),
    }
  }
}

/// Terminal result of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Outcome {
  #[serde(rename = "success")]
  Done(GeneratedChain),
  #[serde(rename = "error")]
  Failed(FailureReport),
}

impl Outcome {
  pub fn is_success(&self) -> bool {
    matches!(self, Outcome::Done(_))
  }

  pub fn chain(&self) -> Option<&ReasoningChain> {
    match self {
      Outcome::Done(generated) => Some(&generated.reasoning_chain),
      Outcome::Failed(_) => None,
    }
  }

  pub fn failure(&self) -> Option<&FailureReport> {
    match self {
      Outcome::Done(_) => None,
      Outcome::Failed(report) => Some(report),
    }
  }
}

/// Request defaults taken from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
  pub default_top_k: usize,
  pub model: String,
  pub temperature: f32,
}

impl PipelineSettings {
  pub fn from_config(config: &Config) -> Self {
    Self {
      default_top_k: config.default_top_k,
      model: config.generation_model.clone(),
      temperature: config.temperature,
    }
  }
}

pub struct Pipeline {
  retriever: Retriever,
  prompt: PromptBuilder,
  generator: GenerationClient,
  settings: PipelineSettings,
}

impl Pipeline {
  pub fn new(
    retriever: Retriever,
    prompt: PromptBuilder,
    generator: GenerationClient,
    settings: PipelineSettings,
  ) -> Self {
    Self { retriever, prompt, generator, settings }
  }

  /// Production pipeline over `store` with hosted embedding and generation.
  pub fn from_config(config: &Config, store: Arc<dyn VectorStore>) -> crate::error::Result<Self> {
    let embedder = Arc::new(EmbeddingClient::from_config(config)?);
    let retriever = Retriever::new(embedder, store).with_min_similarity(config.min_similarity);

    Ok(Self::new(
      retriever,
      PromptBuilder::from_config(config),
      GenerationClient::from_config(config)?,
      PipelineSettings::from_config(config),
    ))
  }

  pub fn settings(&self) -> &PipelineSettings {
    &self.settings
  }

  pub async fn run(&self, request: GenerateRequest) -> Outcome {
    let span = tracing::info_span!("request", id = %Uuid::new_v4());

    async {
      match self.execute(&request).await {
        Ok(generated) => {
          bentley::info!(
            "generated reasoning chain from {} references",
            generated.references.len()
          );
          Outcome::Done(generated)
        }
        Err(failure) => {
          bentley::warn!("request failed while {}: {}", failure.stage, failure.error);
          Outcome::Failed(failure.into())
        }
      }
    }
    .instrument(span)
    .await
  }

  async fn execute(&self, request: &GenerateRequest) -> Result<GeneratedChain, PipelineFailure> {
    let mut state = RequestState::new();
    let question = request.question.trim();
    let top_k = request.top_k.unwrap_or(self.settings.default_top_k);
    let model = request.model.as_deref().unwrap_or(&self.settings.model);

    state.advance(Stage::Retrieving);
    let results = self
      .retriever
      .retrieve(question, top_k)
      .instrument(tracing::debug_span!("retrieve"))
      .await
      .map_err(|e| state.fail(e))?;
    if results.is_empty() {
      return Err(state.fail(ServiceError::store("no reference chains found")));
    }

    state.advance(Stage::Generating);
    let prompt = self.prompt.build(question, &results);
    let raw = self
      .generator
      .generate(&prompt, model, self.settings.temperature)
      .instrument(tracing::debug_span!("generate"))
      .await
      .map_err(|e| state.fail(e))?;

    state.advance(Stage::Parsing);
    let reasoning_chain = ReasoningChain::parse(&raw).map_err(|e| state.fail(e))?;

    state.advance(Stage::Done);
    Ok(GeneratedChain {
      question: question.to_string(),
      reasoning_chain,
      references: results.iter().map(Reference::from).collect(),
      model: model.to_string(),
      generated_at: Utc::now(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::embedding::MockEmbeddingService;
  use crate::generation::MockCompletionService;
  use crate::model::{Provenance, Record};
  use crate::retry::{Backoff, RetryPolicy};
  use crate::store::MemoryStore;
  use serde_json::json;
  use std::time::Duration;

  fn policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_secs(5), Backoff::none())
  }

  fn chain_json() -> String {
    json!({
      "problem_decomposition": "p",
      "data": "d",
      "method": "m",
      "conclusion": "c"
    })
    .to_string()
  }

  async fn pipeline(records: usize, completion: MockCompletionService) -> Pipeline {
    let mut store = MemoryStore::new();
    for i in 0..records {
      let record = Record {
        id: format!("W{i}"),
        summary_text: Record::summary_for("Stress", "neurogenesis"),
        full_payload: ReasoningChain {
          problem_decomposition: "p".to_string(),
          data: "d".to_string(),
          method: "m".to_string(),
          conclusion: "c".to_string(),
        },
        provenance: Provenance { title: format!("Study {i}"), ..Provenance::default() },
      };
      store.upsert(vec![1.0, i as f32], record).await.unwrap();
    }

    let mut embedding = MockEmbeddingService::new();
    embedding.expect_embed().returning(|_| Ok(vec![1.0, 0.0]));
    let embedder = Arc::new(EmbeddingClient::new(Arc::new(embedding), policy()));

    Pipeline::new(
      Retriever::new(embedder, Arc::new(store)),
      PromptBuilder::default(),
      GenerationClient::new(Arc::new(completion), policy(), 3000),
      PipelineSettings { default_top_k: 5, model: "qwen3-max".to_string(), temperature: 0.7 },
    )
  }

  #[test]
  fn test_stage_transitions() {
    assert!(Stage::Idle.can_advance_to(Stage::Retrieving));
    assert!(Stage::Parsing.can_advance_to(Stage::Done));
    assert!(Stage::Generating.can_advance_to(Stage::Failed));
    assert!(!Stage::Idle.can_advance_to(Stage::Generating));
    assert!(!Stage::Done.can_advance_to(Stage::Failed));
    assert!(!Stage::Failed.can_advance_to(Stage::Retrieving));
  }

  #[test]
  fn test_fail_records_stage_of_failure() {
    let mut state = RequestState::new();
    state.advance(Stage::Retrieving);
    state.advance(Stage::Generating);
    let failure = state.fail(ServiceError::transient("timeout"));

    assert_eq!(failure.stage, Stage::Generating);
    assert_eq!(state.stage(), Stage::Failed);
    assert_eq!(
      state.history(),
      &[Stage::Idle, Stage::Retrieving, Stage::Generating, Stage::Failed]
    );
  }

  #[test]
  fn test_outcome_serialisation() {
    let failed = Outcome::Failed(FailureReport {
      error_kind: ErrorKind::AuthError,
      stage: Stage::Generating,
      message: "authentication failed: HTTP 401".to_string(),
    });
    assert_eq!(
      serde_json::to_value(&failed).unwrap(),
      json!({
        "status": "error",
        "error_kind": "auth_error",
        "stage": "generating",
        "message": "authentication failed: HTTP 401"
      })
    );
  }

  #[tokio::test]
  async fn test_success_carries_chain_and_references() {
    let mut completion = MockCompletionService::new();
    completion.expect_complete().times(1).returning(|_| Ok(chain_json()));

    let outcome = pipeline(3, completion).await.run(GenerateRequest::new("  stress?  ")).await;

    let Outcome::Done(generated) = outcome else { panic!("expected success") };
    assert_eq!(generated.question, "stress?");
    assert_eq!(generated.model, "qwen3-max");
    assert_eq!(generated.references.len(), 3);
    assert_eq!(generated.references[0].id, "W0");
    assert!(generated.reasoning_chain.is_complete());
  }

  #[tokio::test]
  async fn test_model_and_top_k_overrides() {
    let mut completion = MockCompletionService::new();
    completion
      .expect_complete()
      .withf(|request| request.model == "qwen-plus")
      .times(1)
      .returning(|_| Ok(chain_json()));

    let request = GenerateRequest {
      question: "stress?".to_string(),
      top_k: Some(2),
      model: Some("qwen-plus".to_string()),
    };
    let outcome = pipeline(4, completion).await.run(request).await;

    let Outcome::Done(generated) = outcome else { panic!("expected success") };
    assert_eq!(generated.references.len(), 2);
    assert_eq!(generated.model, "qwen-plus");
  }

  #[tokio::test]
  async fn test_empty_store_fails_before_generation() {
    let mut completion = MockCompletionService::new();
    completion.expect_complete().times(0);

    let outcome = pipeline(0, completion).await.run(GenerateRequest::new("stress?")).await;

    let report = outcome.failure().unwrap();
    assert_eq!(report.stage, Stage::Retrieving);
    assert_eq!(report.error_kind, ErrorKind::StoreError);
  }

  #[tokio::test]
  async fn test_blank_question_fails_validation_at_retrieval() {
    let mut completion = MockCompletionService::new();
    completion.expect_complete().times(0);

    let outcome = pipeline(2, completion).await.run(GenerateRequest::new("   ")).await;

    let report = outcome.failure().unwrap();
    assert_eq!(report.stage, Stage::Retrieving);
    assert_eq!(report.error_kind, ErrorKind::ValidationError);
  }

  #[tokio::test]
  async fn test_unparseable_reply_fails_at_parsing_without_retry() {
    let mut completion = MockCompletionService::new();
    completion.expect_complete().times(1).returning(|_| Ok("Sorry, no JSON today.".to_string()));

    let outcome = pipeline(2, completion).await.run(GenerateRequest::new("stress?")).await;

    assert!(outcome.chain().is_none());
    let report = outcome.failure().unwrap();
    assert_eq!(report.stage, Stage::Parsing);
    assert_eq!(report.error_kind, ErrorKind::MalformedResponseError);
  }
}
