//! Arrow RecordBatch conversion for stored reasoning records

use arrow::array::{Array, ArrayRef, FixedSizeListBuilder, Float32Builder, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use crate::error::{Result, ServiceError};
use crate::model::Record;

pub const ID_COLUMN: &str = "id";
pub const SUMMARY_COLUMN: &str = "summary";
pub const RECORD_COLUMN: &str = "record";
pub const VECTOR_COLUMN: &str = "vector";

/// Table schema for `dimension`-wide vectors.
///
/// `record` holds the whole record as JSON; only `vector` (built from the
/// summary) is searched.
pub fn record_schema(dimension: usize) -> SchemaRef {
  Arc::new(Schema::new(vec![
    Field::new(ID_COLUMN, DataType::Utf8, false),
    Field::new(SUMMARY_COLUMN, DataType::Utf8, false),
    Field::new(RECORD_COLUMN, DataType::Utf8, false),
    Field::new(
      VECTOR_COLUMN,
      DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dimension as i32),
      false,
    ),
  ]))
}

/// Dimension of the vector column of an existing table.
pub fn vector_dimension(schema: &Schema) -> Option<usize> {
  match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
    DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
    _ => None,
  }
}

/// Convert `(vector, record)` pairs into one batch.
pub fn records_to_batch(items: &[(Vec<f32>, Record)], dimension: usize) -> Result<RecordBatch> {
  if items.is_empty() {
    return Err(ServiceError::store("cannot build a batch from zero records"));
  }

  let payloads = items
    .iter()
    .map(|(_, record)| serde_json::to_string(record))
    .collect::<std::result::Result<Vec<_>, _>>()
    .map_err(|e| ServiceError::store(format!("failed to encode record: {e}")))?;

  let ids = StringArray::from_iter_values(items.iter().map(|(_, record)| record.id.as_str()));
  let summaries =
    StringArray::from_iter_values(items.iter().map(|(_, record)| record.summary_text.as_str()));
  let records = StringArray::from_iter_values(payloads.iter().map(String::as_str));
  let vectors = vector_array(items, dimension);

  let columns: Vec<ArrayRef> =
    vec![Arc::new(ids), Arc::new(summaries), Arc::new(records), Arc::new(vectors)];

  RecordBatch::try_new(record_schema(dimension), columns)
    .map_err(|e| ServiceError::store(format!("failed to create RecordBatch: {e}")))
}

fn vector_array(
  items: &[(Vec<f32>, Record)],
  dimension: usize,
) -> arrow::array::FixedSizeListArray {
  let mut builder =
    FixedSizeListBuilder::new(Float32Builder::with_capacity(dimension * items.len()), dimension as i32);

  for (vector, _) in items {
    builder.values().append_slice(vector);
    builder.append(true);
  }

  builder.finish()
}

/// Decode the `record` column at `row`.
pub fn record_at(records: &StringArray, row: usize) -> Result<Record> {
  if records.is_null(row) {
    return Err(ServiceError::store(format!("row {row} has no record payload")));
  }
  serde_json::from_str(records.value(row))
    .map_err(|e| ServiceError::store(format!("stored record at row {row} is corrupt: {e}")))
}
