use std::path::Path;

use lancedb::{Connection, connect};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::schema::{
  bootstrap_progress_schema, chunks_schema, files_schema, links_schema, symbols_schema, usage_metrics_schema,
};

pub const FILES_TABLE: &str = "files";
pub const CHUNKS_TABLE: &str = "chunks";
pub const SYMBOLS_TABLE: &str = "symbols";
pub const LINKS_TABLE: &str = "links";
pub const BOOTSTRAP_PROGRESS_TABLE: &str = "bootstrap_progress";
pub const USAGE_METRICS_TABLE: &str = "usage_metrics";

/// A single LanceDB connection owning the six tables of the context index.
///
/// `write_lock` serializes every write path (`replace_file_artifacts`, the
/// individual `upsert_*`/`delete_*`/`insert_*` helpers) into a single writer
/// lane; LanceDB table handles themselves have no cross-call write isolation,
/// so two files reindexing concurrently would otherwise race on the same
/// table.
pub struct Store {
  pub connection: Connection,
  pub vector_dim: usize,
  pub(crate) write_lock: Mutex<()>,
}

impl Store {
  pub async fn open(db_path: impl AsRef<Path>, vector_dim: usize) -> Result<Self> {
    let db_path = db_path.as_ref();
    if let Some(parent) = db_path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }

    info!(path = %db_path.display(), vector_dim, "opening context store");
    let connection = connect(db_path.to_string_lossy().as_ref()).execute().await?;

    let store = Store { connection, vector_dim, write_lock: Mutex::new(()) };
    store.ensure_tables().await?;
    Ok(store)
  }

  async fn ensure_tables(&self) -> Result<()> {
    let existing = self.connection.table_names().execute().await?;

    if !existing.contains(&FILES_TABLE.to_string()) {
      debug!("creating files table");
      self.connection.create_empty_table(FILES_TABLE, files_schema()).execute().await?;
    }
    if !existing.contains(&CHUNKS_TABLE.to_string()) {
      debug!("creating chunks table");
      self
        .connection
        .create_empty_table(CHUNKS_TABLE, chunks_schema(self.vector_dim))
        .execute()
        .await?;
    }
    if !existing.contains(&SYMBOLS_TABLE.to_string()) {
      debug!("creating symbols table");
      self.connection.create_empty_table(SYMBOLS_TABLE, symbols_schema()).execute().await?;
    }
    if !existing.contains(&LINKS_TABLE.to_string()) {
      debug!("creating links table");
      self.connection.create_empty_table(LINKS_TABLE, links_schema()).execute().await?;
    }
    if !existing.contains(&BOOTSTRAP_PROGRESS_TABLE.to_string()) {
      debug!("creating bootstrap_progress table");
      self
        .connection
        .create_empty_table(BOOTSTRAP_PROGRESS_TABLE, bootstrap_progress_schema())
        .execute()
        .await?;
    }
    if !existing.contains(&USAGE_METRICS_TABLE.to_string()) {
      debug!("creating usage_metrics table");
      self.connection.create_empty_table(USAGE_METRICS_TABLE, usage_metrics_schema()).execute().await?;
    }

    Ok(())
  }

  pub async fn files_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(FILES_TABLE).execute().await?)
  }

  pub async fn chunks_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(CHUNKS_TABLE).execute().await?)
  }

  pub async fn symbols_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(SYMBOLS_TABLE).execute().await?)
  }

  pub async fn links_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(LINKS_TABLE).execute().await?)
  }

  pub async fn bootstrap_progress_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(BOOTSTRAP_PROGRESS_TABLE).execute().await?)
  }

  pub async fn usage_metrics_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(USAGE_METRICS_TABLE).execute().await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn opening_creates_all_six_tables() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("test.lancedb"), 8).await.unwrap();
    let tables = store.connection.table_names().execute().await.unwrap();
    for name in [FILES_TABLE, CHUNKS_TABLE, SYMBOLS_TABLE, LINKS_TABLE, BOOTSTRAP_PROGRESS_TABLE, USAGE_METRICS_TABLE] {
      assert!(tables.contains(&name.to_string()), "missing table {name}");
    }
  }
}
