//! Table management operations for LanceDB

use arrow::record_batch::RecordBatchIterator;
use lancedb::{Connection, Table};

use super::records::{records_to_batch, vector_dimension};
use crate::error::{Result, ServiceError};
use crate::model::Record;

/// Owns the connection and remembers the vector width of the table.
pub struct TableManager {
  connection: Connection,
  table_name: String,
  dimension: Option<usize>,
}

impl TableManager {
  /// Attach to `table_name`, reading the vector width if the table exists.
  pub async fn open(connection: Connection, table_name: &str) -> Result<Self> {
    let mut manager = Self { connection, table_name: table_name.to_string(), dimension: None };

    if manager.table_exists().await? {
      let schema = manager
        .table()
        .await?
        .schema()
        .await
        .map_err(|e| ServiceError::store(format!("failed to read table schema: {e}")))?;
      manager.dimension = vector_dimension(&schema);
    }
    Ok(manager)
  }

  pub fn dimension(&self) -> Option<usize> {
    self.dimension
  }

  pub async fn table_exists(&self) -> Result<bool> {
    let tables = self
      .connection
      .table_names()
      .execute()
      .await
      .map_err(|e| ServiceError::store(format!("failed to list tables: {e}")))?;
    Ok(tables.contains(&self.table_name))
  }

  pub async fn table(&self) -> Result<Table> {
    self
      .connection
      .open_table(&self.table_name)
      .execute()
      .await
      .map_err(|e| ServiceError::store(format!("failed to open table '{}': {e}", self.table_name)))
  }

  pub async fn count(&self) -> Result<usize> {
    if !self.table_exists().await? {
      return Ok(0);
    }
    self
      .table()
      .await?
      .count_rows(None)
      .await
      .map_err(|e| ServiceError::store(format!("failed to count rows: {e}")))
  }

  /// Replace any rows with the same ids, then append `items`.
  pub async fn upsert(&mut self, items: &[(Vec<f32>, Record)]) -> Result<()> {
    let Some((first, _)) = items.first() else { return Ok(()) };
    let dimension = *self.dimension.get_or_insert(first.len());

    let batch = records_to_batch(items, dimension)?;
    let schema = batch.schema();
    let batch_iter = RecordBatchIterator::new(vec![Ok(batch)], schema);

    if self.table_exists().await? {
      let table = self.table().await?;
      table
        .delete(&id_predicate(items))
        .await
        .map_err(|e| ServiceError::store(format!("failed to remove previous rows: {e}")))?;
      table
        .add(batch_iter)
        .execute()
        .await
        .map_err(|e| ServiceError::store(format!("failed to store records: {e}")))?;
    } else {
      self
        .connection
        .create_table(&self.table_name, batch_iter)
        .execute()
        .await
        .map_err(|e| ServiceError::store(format!("failed to create table: {e}")))?;
      bentley::info!("created table '{}' with {dimension}-dimensional vectors", self.table_name);
    }

    bentley::verbose!("stored {} records in '{}'", items.len(), self.table_name);
    Ok(())
  }
}

/// `id IN ('a', 'b')`, quoting ids for SQL.
fn id_predicate(items: &[(Vec<f32>, Record)]) -> String {
  let ids: Vec<String> =
    items.iter().map(|(_, record)| format!("'{}'", record.id.replace('\'', "''"))).collect();
  format!("id IN ({})", ids.join(", "))
}
