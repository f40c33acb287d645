//! LanceDB-backed vector store.
//!
//! One table per corpus with columns `id`, `summary`, `record` and `vector`.
//! The vector is computed from the summary alone, while `record` carries the
//! complete structured record, so a hit returns everything the prompt needs
//! without a second lookup.

pub mod connection;
pub mod records;
pub mod search;
pub mod table_manager;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{check_vector, rank, VectorStore};
use crate::error::Result;
use crate::model::{Record, RetrievedRecord};
use connection::{create_connection, replace_data_directory};
use search::search_similar;
use table_manager::TableManager;

pub struct LanceDbStore {
  table_manager: TableManager,
  table_name: String,
  rebuild: Option<Rebuild>,
}

/// Writes go to `staging` until `persist` moves it over `target`.
struct Rebuild {
  staging: PathBuf,
  target: PathBuf,
}

impl LanceDbStore {
  /// Open the table under `data_dir`. With `reset` an empty table is built
  /// next to it and only takes the place of the old one on `persist`.
  pub async fn open(data_dir: &Path, table_name: &str, reset: bool) -> Result<Self> {
    let rebuild =
      reset.then(|| Rebuild { staging: staging_dir(data_dir), target: data_dir.to_path_buf() });
    let connection = match &rebuild {
      Some(rebuild) => create_connection(&rebuild.staging, true).await?,
      None => create_connection(data_dir, false).await?,
    };
    let table_manager = TableManager::open(connection, table_name).await?;
    Ok(Self { table_manager, table_name: table_name.to_string(), rebuild })
  }
}

fn staging_dir(data_dir: &Path) -> PathBuf {
  let mut name = data_dir.file_name().map(|name| name.to_os_string()).unwrap_or_default();
  name.push(".staging");
  data_dir.with_file_name(name)
}

#[async_trait]
impl VectorStore for LanceDbStore {
  async fn upsert(&mut self, vector: Vec<f32>, record: Record) -> Result<()> {
    self.upsert_batch(vec![(vector, record)]).await
  }

  async fn upsert_batch(&mut self, items: Vec<(Vec<f32>, Record)>) -> Result<()> {
    let mut expected = self.table_manager.dimension();
    for (vector, _) in &items {
      check_vector(vector, expected)?;
      expected.get_or_insert(vector.len());
    }
    self.table_manager.upsert(&items).await
  }

  async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedRecord>> {
    if k == 0 || !self.table_manager.table_exists().await? {
      return Ok(Vec::new());
    }
    check_vector(vector, self.table_manager.dimension())?;

    let table = self.table_manager.table().await?;
    let mut results = search_similar(&table, vector, k).await?;
    rank(&mut results, k);
    Ok(results)
  }

  async fn len(&self) -> Result<usize> {
    self.table_manager.count().await
  }

  async fn persist(&mut self) -> Result<()> {
    // upserts are committed as table versions; only a rebuild has work left
    let Some(rebuild) = self.rebuild.take() else { return Ok(()) };

    replace_data_directory(&rebuild.staging, &rebuild.target)?;
    let connection = create_connection(&rebuild.target, false).await?;
    self.table_manager = TableManager::open(connection, &self.table_name).await?;
    bentley::info!("rebuilt vector store at {}", rebuild.target.display());
    Ok(())
  }
}
