//! Brute-force cosine store, optionally backed by a JSON file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::{check_vector, rank, VectorStore};
use crate::error::{Result, ServiceError};
use crate::model::{Record, RetrievedRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
  vector: Vec<f32>,
  record: Record,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
  dimension: Option<usize>,
  entries: Vec<Entry>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: Vec<Entry>,
  positions: HashMap<String, usize>,
  dimension: Option<usize>,
  path: Option<PathBuf>,
}

impl MemoryStore {
  /// A store that lives only as long as the process.
  pub fn new() -> Self {
    Self::default()
  }

  /// A store persisted at `path`, loading what is already there.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let snapshot = if path.exists() {
      let content = std::fs::read_to_string(&path).map_err(|e| {
        ServiceError::store(format!("failed to read {}: {e}", path.display()))
      })?;
      serde_json::from_str::<Snapshot>(&content).map_err(|e| {
        ServiceError::store(format!("{} is not a valid store file: {e}", path.display()))
      })?
    } else {
      Snapshot::default()
    };

    let mut store = Self { dimension: snapshot.dimension, path: Some(path), ..Self::default() };
    for entry in snapshot.entries {
      store.insert(entry);
    }
    bentley::verbose!("opened memory store with {} records", store.entries.len());
    Ok(store)
  }

  /// An empty store that replaces whatever is at `path` on the next
  /// [`VectorStore::persist`]. The existing file is left alone until then.
  pub fn replacing(path: impl Into<PathBuf>) -> Self {
    Self { path: Some(path.into()), ..Self::default() }
  }

  fn insert(&mut self, entry: Entry) {
    match self.positions.get(&entry.record.id) {
      Some(&position) => self.entries[position] = entry,
      None => {
        self.positions.insert(entry.record.id.clone(), self.entries.len());
        self.entries.push(entry);
      }
    }
  }
}

#[async_trait]
impl VectorStore for MemoryStore {
  async fn upsert(&mut self, vector: Vec<f32>, record: Record) -> Result<()> {
    check_vector(&vector, self.dimension)?;
    if record.id.trim().is_empty() {
      return Err(ServiceError::validation("record id must not be empty"));
    }
    self.dimension.get_or_insert(vector.len());
    self.insert(Entry { vector, record });
    Ok(())
  }

  async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedRecord>> {
    if k == 0 || self.entries.is_empty() {
      return Ok(Vec::new());
    }
    check_vector(vector, self.dimension)?;

    let mut results: Vec<RetrievedRecord> = self
      .entries
      .iter()
      .map(|entry| RetrievedRecord {
        record: entry.record.clone(),
        score: cosine_similarity(vector, &entry.vector),
      })
      .collect();

    rank(&mut results, k);
    Ok(results)
  }

  async fn len(&self) -> Result<usize> {
    Ok(self.entries.len())
  }

  async fn persist(&mut self) -> Result<()> {
    let Some(path) = &self.path else { return Ok(()) };

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        ServiceError::store(format!("failed to create {}: {e}", parent.display()))
      })?;
    }

    let snapshot = Snapshot { dimension: self.dimension, entries: self.entries.clone() };
    let content = serde_json::to_vec(&snapshot)
      .map_err(|e| ServiceError::store(format!("failed to encode store: {e}")))?;

    // staged write, then rename over the target
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, content)
      .and_then(|_| std::fs::rename(&staging, path))
      .map_err(|e| ServiceError::store(format!("failed to write {}: {e}", path.display())))?;

    bentley::verbose!("persisted {} records to {}", self.entries.len(), path.display());
    Ok(())
  }
}

/// Cosine similarity in [-1, 1]; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
  for (x, y) in a.iter().zip(b) {
    dot += x * y;
    norm_a += x * x;
    norm_b += y * y;
  }
  if norm_a == 0.0 || norm_b == 0.0 {
    return 0.0;
  }
  dot / (norm_a.sqrt() * norm_b.sqrt())
}
