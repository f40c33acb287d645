//! Vector search and result decoding for LanceDB

use arrow::array::{Array, Float32Array, StringArray};
use arrow::record_batch::RecordBatch;
use futures::stream::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};

use super::records::{record_at, RECORD_COLUMN, VECTOR_COLUMN};
use crate::error::{Result, ServiceError};
use crate::model::RetrievedRecord;

const DISTANCE_COLUMN: &str = "_distance";

/// Nearest `limit` records to `vector` by cosine distance.
pub async fn search_similar(
  table: &Table,
  vector: &[f32],
  limit: usize,
) -> Result<Vec<RetrievedRecord>> {
  let batches: Vec<RecordBatch> = table
    .vector_search(vector)
    .map_err(|e| ServiceError::store(format!("invalid vector query: {e}")))?
    .column(VECTOR_COLUMN)
    .distance_type(DistanceType::Cosine)
    .limit(limit)
    .execute()
    .await
    .map_err(|e| ServiceError::store(format!("vector search failed: {e}")))?
    .try_collect()
    .await
    .map_err(|e| ServiceError::store(format!("error reading search results: {e}")))?;

  let mut results = Vec::new();
  for batch in &batches {
    results.extend(decode_batch(batch)?);
  }

  if results.is_empty() {
    bentley::verbose!("no similar records found");
  }
  Ok(results)
}

fn decode_batch(batch: &RecordBatch) -> Result<Vec<RetrievedRecord>> {
  let records = string_column(batch, RECORD_COLUMN)?;
  let distances = batch
    .column_by_name(DISTANCE_COLUMN)
    .and_then(|column| column.as_any().downcast_ref::<Float32Array>())
    .ok_or_else(|| ServiceError::store("search results have no distance column"))?;

  (0..batch.num_rows())
    .map(|row| {
      let record = record_at(records, row)?;
      let distance = if distances.is_null(row) { 1.0 } else { distances.value(row) };
      Ok(RetrievedRecord { record, score: distance_to_similarity(distance) })
    })
    .collect()
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
  batch
    .column_by_name(name)
    .ok_or_else(|| ServiceError::store(format!("missing '{name}' column")))?
    .as_any()
    .downcast_ref::<StringArray>()
    .ok_or_else(|| ServiceError::store(format!("'{name}' column is not a string column")))
}

/// Cosine distance lies in [0, 2]; similarity is its complement.
pub fn distance_to_similarity(distance: f32) -> f32 {
  1.0 - distance
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_distance_to_similarity() {
    assert_eq!(distance_to_similarity(0.0), 1.0);
    assert_eq!(distance_to_similarity(1.0), 0.0);
    assert_eq!(distance_to_similarity(2.0), -1.0);
  }
}
