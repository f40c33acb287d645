//! Vector store abstraction.
//!
//! A store maps record ids to `(vector, record)` pairs and answers nearest
//! neighbour queries with the full record attached. Writing requires `&mut`,
//! so once a store is shared behind an `Arc` for serving it is read-only and
//! concurrent queries need no locking.

pub mod memory;

#[cfg(feature = "lancedb")]
pub mod lancedb;

use async_trait::async_trait;

use crate::config::{Config, StoreBackend};
use crate::error::{Result, ServiceError};
use crate::model::{Record, RetrievedRecord};

pub use memory::MemoryStore;

#[cfg(feature = "lancedb")]
pub use self::lancedb::LanceDbStore;

#[async_trait]
pub trait VectorStore: Send + Sync {
  /// Insert `record` under `record.id`, replacing any previous entry with that id.
  async fn upsert(&mut self, vector: Vec<f32>, record: Record) -> Result<()>;

  /// Upsert many records at once. Backends with a cheaper bulk path override this.
  async fn upsert_batch(&mut self, items: Vec<(Vec<f32>, Record)>) -> Result<()> {
    for (vector, record) in items {
      self.upsert(vector, record).await?;
    }
    Ok(())
  }

  /// At most `k` records, most similar first.
  async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedRecord>>;

  async fn len(&self) -> Result<usize>;

  async fn is_empty(&self) -> Result<bool> {
    Ok(self.len().await? == 0)
  }

  /// Flush pending writes to durable storage, where the backend has any. A
  /// store opened with `reset` replaces the previous contents here.
  async fn persist(&mut self) -> Result<()>;
}

/// Open the configured backend.
///
/// With `reset` the store starts empty, and what was stored before is only
/// replaced once [`VectorStore::persist`] succeeds.
pub async fn open_store(config: &Config, reset: bool) -> Result<Box<dyn VectorStore>> {
  match config.store_backend {
    StoreBackend::Memory => {
      let path = config.store_path.join(format!("{}.json", config.table_name));
      if reset {
        return Ok(Box::new(MemoryStore::replacing(path)));
      }
      Ok(Box::new(MemoryStore::open(path)?))
    }
    #[cfg(feature = "lancedb")]
    StoreBackend::Lancedb => {
      let store = LanceDbStore::open(&config.store_path, &config.table_name, reset).await?;
      Ok(Box::new(store))
    }
    #[cfg(not(feature = "lancedb"))]
    StoreBackend::Lancedb => Err(ServiceError::validation(
      "this build has no LanceDB support; set store_backend to 'memory'",
    )),
  }
}

/// Reject vectors no backend can store or compare.
pub(crate) fn check_vector(vector: &[f32], expected: Option<usize>) -> Result<()> {
  if vector.is_empty() {
    return Err(ServiceError::validation("vector must not be empty"));
  }
  if let Some(expected) = expected {
    if vector.len() != expected {
      return Err(ServiceError::validation(format!(
        "vector has {} dimensions but the store holds {expected}-dimensional vectors",
        vector.len()
      )));
    }
  }
  if vector.iter().any(|value| !value.is_finite()) {
    return Err(ServiceError::validation("vector contains non-finite values"));
  }
  Ok(())
}

/// Order by descending score, ties by id, so equal inputs give equal output.
pub(crate) fn rank(results: &mut Vec<RetrievedRecord>, k: usize) {
  results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.record.id.cmp(&b.record.id)));
  results.truncate(k);
}
