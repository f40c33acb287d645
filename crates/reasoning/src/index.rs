//! Offline index build: corpus JSONL in, populated vector store out.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::embedding::EmbeddingClient;
use crate::error::{Result, ServiceError};
use crate::model::{Provenance, ReasoningChain, Record};
use crate::store::VectorStore;

/// Records written to the store per batch
const UPSERT_BATCH_SIZE: usize = 50;

/// One line of the corpus file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
  #[serde(default)]
  pub paper_id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub doi: Option<String>,
  #[serde(default)]
  pub year: Option<u32>,
  #[serde(default)]
  pub citation_count: Option<u64>,
  #[serde(default)]
  pub journal: Option<String>,
  #[serde(default)]
  pub problem_decomposition: String,
  #[serde(default)]
  pub data: String,
  #[serde(default)]
  pub method: String,
  #[serde(default)]
  pub conclusion: String,
}

impl CorpusEntry {
  /// The stored record, or `None` when a section is blank.
  pub fn to_record(&self, line: usize) -> Option<Record> {
    let full_payload = ReasoningChain {
      problem_decomposition: self.problem_decomposition.trim().to_string(),
      data: self.data.trim().to_string(),
      method: self.method.trim().to_string(),
      conclusion: self.conclusion.trim().to_string(),
    };
    if !full_payload.is_complete() {
      return None;
    }

    let title = match self.title.trim() {
      "" => "Unknown Title".to_string(),
      title => title.to_string(),
    };
    let id = match self.paper_id.trim() {
      "" => format!("line-{line}"),
      id => id.to_string(),
    };

    Some(Record {
      id,
      summary_text: Record::summary_for(&title, &full_payload.problem_decomposition),
      full_payload,
      provenance: Provenance {
        title,
        year: self.year,
        doi: self.doi.clone().unwrap_or_default(),
        journal: self.journal.clone().unwrap_or_default(),
        citation_count: self.citation_count.unwrap_or(0),
      },
    })
  }
}

/// Read a JSONL corpus, returning `(line number, entry)` pairs.
pub fn load_corpus(path: &Path) -> Result<Vec<(usize, CorpusEntry)>> {
  let file = std::fs::File::open(path)
    .map_err(|e| ServiceError::validation(format!("cannot open {}: {e}", path.display())))?;
  parse_corpus(BufReader::new(file))
}

pub fn parse_corpus(reader: impl BufRead) -> Result<Vec<(usize, CorpusEntry)>> {
  let mut entries = Vec::new();
  for (index, line) in reader.lines().enumerate() {
    let number = index + 1;
    let line = line.map_err(|e| ServiceError::validation(format!("line {number}: {e}")))?;
    if line.trim().is_empty() {
      continue;
    }
    let entry = serde_json::from_str(&line)
      .map_err(|e| ServiceError::validation(format!("line {number}: {e}")))?;
    entries.push((number, entry));
  }
  Ok(entries)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
  pub indexed: usize,
  pub skipped: usize,
  pub failed: usize,
}

impl IndexReport {
  pub fn total(&self) -> usize {
    self.indexed + self.skipped + self.failed
  }
}

/// Embed and store every complete entry.
///
/// Only the summary of each record is embedded. Incomplete entries are
/// skipped; an entry whose embedding fails is counted and logged while the rest
/// of the batch carries on. Auth failures abort, since every later call would
/// fail the same way. Store errors abort too.
pub async fn build_index(
  entries: &[(usize, CorpusEntry)],
  embedder: &EmbeddingClient,
  store: &mut dyn VectorStore,
  concurrency: usize,
) -> Result<IndexReport> {
  let mut report = IndexReport::default();

  // later lines win when a paper id repeats
  let mut records: Vec<Record> = Vec::with_capacity(entries.len());
  let mut positions: HashMap<String, usize> = HashMap::new();
  for (line, entry) in entries {
    match entry.to_record(*line) {
      Some(record) => match positions.get(&record.id) {
        Some(&position) => {
          bentley::verbose!("line {line}: duplicate id {}, replacing earlier entry", record.id);
          records[position] = record;
          report.skipped += 1;
        }
        None => {
          positions.insert(record.id.clone(), records.len());
          records.push(record);
        }
      },
      None => {
        bentley::warn!("line {line}: skipping incomplete reasoning chain '{}'", entry.title);
        report.skipped += 1;
      }
    }
  }

  bentley::info!("embedding {} records", records.len());

  let mut embedded = stream::iter(records)
    .map(|record| async move {
      let result = embedder.embed(&record.summary_text).await;
      (record, result)
    })
    .buffered(concurrency.max(1));

  let mut batch = Vec::with_capacity(UPSERT_BATCH_SIZE);
  while let Some((record, result)) = embedded.next().await {
    match result {
      Ok(vector) => batch.push((vector, record)),
      Err(error @ ServiceError::Auth { .. }) => return Err(error),
      Err(error) => {
        bentley::warn!("embedding failed for '{}': {error}", record.provenance.title);
        report.failed += 1;
      }
    }

    if batch.len() >= UPSERT_BATCH_SIZE {
      report.indexed += batch.len();
      store.upsert_batch(std::mem::take(&mut batch)).await?;
      bentley::verbose!("{} records stored", report.indexed);
    }
  }

  if !batch.is_empty() {
    report.indexed += batch.len();
    store.upsert_batch(batch).await?;
  }
  store.persist().await?;

  bentley::info!(
    "indexed {} records ({} skipped, {} failed)",
    report.indexed,
    report.skipped,
    report.failed
  );
  Ok(report)
}
