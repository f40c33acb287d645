use std::sync::Arc;

use crate::embedding::EmbeddingClient;
use crate::error::{Result, ServiceError};
use crate::model::RetrievalResult;
use crate::store::{rank, VectorStore};

/// Question in, nearest reference records out.
pub struct Retriever {
  embedder: Arc<EmbeddingClient>,
  store: Arc<dyn VectorStore>,
  min_similarity: Option<f32>,
}

impl Retriever {
  pub fn new(embedder: Arc<EmbeddingClient>, store: Arc<dyn VectorStore>) -> Self {
    Self { embedder, store, min_similarity: None }
  }

  /// Drop results scoring below `threshold`.
  pub fn with_min_similarity(mut self, threshold: Option<f32>) -> Self {
    self.min_similarity = threshold;
    self
  }

  /// At most `top_k` records, most similar first. Errors from the embedder or
  /// the store are returned unchanged.
  pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<RetrievalResult> {
    if top_k == 0 {
      return Err(ServiceError::validation("top_k must be at least 1"));
    }

    let vector = self.embedder.embed(question).await?;
    let mut results = self.store.query(&vector, top_k).await?;

    if let Some(threshold) = self.min_similarity {
      let before = results.len();
      results.retain(|result| result.score >= threshold);
      if results.len() < before {
        bentley::verbose!(
          "dropped {} results below similarity {threshold}",
          before - results.len()
        );
      }
    }

    rank(&mut results, top_k);
    bentley::verbose!("retrieved {} reference records", results.len());
    Ok(results)
  }
}
