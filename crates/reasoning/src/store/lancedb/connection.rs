//! Database connection management for LanceDB

use lancedb::{connect, Connection};
use std::path::Path;

use crate::error::{Result, ServiceError};

/// Connect to the database at `data_dir`, creating the directory if needed.
///
/// With `reset` the directory is deleted first.
pub async fn create_connection(data_dir: &Path, reset: bool) -> Result<Connection> {
  if reset {
    clear_data_directory(data_dir)?;
  }
  ensure_data_directory_exists(data_dir)?;

  connect(&data_dir.to_string_lossy())
    .execute()
    .await
    .map_err(|e| ServiceError::store(format!("failed to connect to LanceDB: {e}")))
}

fn clear_data_directory(data_dir: &Path) -> Result<()> {
  if data_dir.exists() {
    std::fs::remove_dir_all(data_dir).map_err(|e| {
      ServiceError::store(format!("failed to clear {}: {e}", data_dir.display()))
    })?;
    bentley::info!("cleared vector store at {}", data_dir.display());
  }
  Ok(())
}

/// Move a fully built `staging` directory over `target`.
pub fn replace_data_directory(staging: &Path, target: &Path) -> Result<()> {
  clear_data_directory(target)?;
  std::fs::rename(staging, target).map_err(|e| {
    ServiceError::store(format!(
      "failed to move {} to {}: {e}",
      staging.display(),
      target.display()
    ))
  })
}

fn ensure_data_directory_exists(data_dir: &Path) -> Result<()> {
  if !data_dir.exists() {
    std::fs::create_dir_all(data_dir).map_err(|e| {
      ServiceError::store(format!("failed to create data directory {}: {e}", data_dir.display()))
    })?;
  }
  Ok(())
}
