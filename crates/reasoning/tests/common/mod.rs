//! Deterministic stand-ins for the hosted services.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reasoning::embedding::{EmbeddingClient, EmbeddingService};
use reasoning::error::{Result, ServiceError};
use reasoning::generation::{CompletionRequest, CompletionService, GenerationClient};
use reasoning::model::{Provenance, ReasoningChain, Record};
use reasoning::pipeline::{Pipeline, PipelineSettings};
use reasoning::prompt::PromptBuilder;
use reasoning::retriever::Retriever;
use reasoning::retry::{Backoff, RetryPolicy};
use reasoning::store::{MemoryStore, VectorStore};

pub const QUESTION: &str = "How does chronic stress affect hippocampal neurogenesis?";

const VOCABULARY: &[&str] = &[
  "stress",
  "neurogenesis",
  "hippocampal",
  "chronic",
  "dopamine",
  "reward",
  "sleep",
  "visual",
  "cortex",
  "memory",
];

/// Bag-of-words embedding over a small vocabulary.
pub fn keyword_vector(text: &str) -> Vec<f32> {
  let mut vector = vec![0.0; VOCABULARY.len()];
  for word in text.split(|c: char| !c.is_alphanumeric()) {
    let word = word.to_lowercase();
    if let Some(position) = VOCABULARY.iter().position(|known| *known == word) {
      vector[position] += 1.0;
    }
  }
  vector
}

#[derive(Default)]
pub struct KeywordEmbedder {
  pub calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingService for KeywordEmbedder {
  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(keyword_vector(text))
  }
}

pub enum Script {
  Reply(String),
  Fail(ServiceError),
  Hang,
}

/// Completion backend that does the same thing on every call and counts calls.
pub struct ScriptedCompletion {
  script: Script,
  pub calls: AtomicUsize,
}

impl ScriptedCompletion {
  pub fn new(script: Script) -> Arc<Self> {
    Arc::new(Self { script, calls: AtomicUsize::new(0) })
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
  async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    match &self.script {
      Script::Reply(text) => Ok(text.clone()),
      Script::Fail(error) => Err(error.clone()),
      Script::Hang => std::future::pending().await,
    }
  }
}

pub fn chain_reply() -> String {
  serde_json::json!({
    "problem_decomposition": "Chronic stress elevates glucocorticoids, which may suppress progenitor proliferation in the dentate gyrus.",
    "data": "Adult male mice, hippocampal sections, serum corticosterone.",
    "method": "Chronic unpredictable stress for 28 days, BrdU pulse labelling and DCX immunostaining.",
    "conclusion": "Stressed animals should show fewer newborn neurons, linking stress to impaired neurogenesis."
  })
  .to_string()
}

pub fn record(id: &str, title: &str, problem: &str) -> Record {
  Record {
    id: id.to_string(),
    summary_text: Record::summary_for(title, problem),
    full_payload: ReasoningChain {
      problem_decomposition: problem.to_string(),
      data: format!("Data for {title}"),
      method: format!("Methods for {title}"),
      conclusion: format!("Conclusion for {title}"),
    },
    provenance: Provenance {
      title: title.to_string(),
      year: Some(2010),
      citation_count: 25,
      ..Provenance::default()
    },
  }
}

/// Six stress/neurogenesis studies and three unrelated ones.
pub async fn neuroscience_store() -> MemoryStore {
  let mut records = Vec::new();
  for i in 1..=6 {
    records.push(record(
      &format!("stress-{i}"),
      &format!("Chronic stress and hippocampal neurogenesis, cohort {i}"),
      "Does chronic stress suppress adult neurogenesis in the hippocampus?",
    ));
  }
  records.push(record("reward", "Dopamine and reward prediction", "How does dopamine encode reward?"));
  records.push(record("sleep", "Sleep and memory consolidation", "Does sleep consolidate memory?"));
  records.push(record("vision", "Visual cortex plasticity", "How plastic is the visual cortex?"));

  let mut store = MemoryStore::new();
  for record in records {
    store.upsert(keyword_vector(&record.summary_text), record).await.unwrap();
  }
  store
}

pub fn retry_policy(max_attempts: u32) -> RetryPolicy {
  RetryPolicy::new(
    max_attempts,
    Duration::from_secs(60),
    Backoff::new(Duration::from_secs(1), Duration::from_secs(30)),
  )
}

pub async fn pipeline(completion: Arc<ScriptedCompletion>, max_attempts: u32) -> Pipeline {
  let store: Arc<dyn VectorStore> = Arc::new(neuroscience_store().await);
  pipeline_over(store, completion, max_attempts)
}

pub fn pipeline_over(
  store: Arc<dyn VectorStore>,
  completion: Arc<ScriptedCompletion>,
  max_attempts: u32,
) -> Pipeline {
  let embedder =
    EmbeddingClient::new(Arc::new(KeywordEmbedder::default()), retry_policy(max_attempts));

  Pipeline::new(
    Retriever::new(Arc::new(embedder), store),
    PromptBuilder::default(),
    GenerationClient::new(completion, retry_policy(max_attempts), 3000),
    PipelineSettings { default_top_k: 5, model: "qwen3-max".to_string(), temperature: 0.7 },
  )
}
