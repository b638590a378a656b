use arrow_array::{Array, BooleanArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray, UInt64Array};
use context_core::{File as ModelFile, FileStatus};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::connection::Store;
use crate::error::{Result, StoreError};
use crate::schema::files_schema;

impl Store {
  pub async fn upsert_file(&self, file: &ModelFile) -> Result<()> {
    trace!(rel_path = %file.rel_path, "upserting file");
    let table = self.files_table().await?;
    table.delete(&format!("rel_path = '{}'", escape(&file.rel_path))).await?;

    let batch = file_to_batch(file)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], files_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn get_file_by_rel_path(&self, rel_path: &str) -> Result<Option<ModelFile>> {
    let table = self.files_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("rel_path = '{}' AND is_deleted = false", escape(rel_path)))
      .execute()
      .await?
      .try_collect()
      .await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_file(batch, 0)?));
      }
    }
    Ok(None)
  }

  pub async fn get_file_by_id(&self, file_id: Uuid) -> Result<Option<ModelFile>> {
    let table = self.files_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("file_id = '{}' AND is_deleted = false", file_id))
      .execute()
      .await?
      .try_collect()
      .await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_file(batch, 0)?));
      }
    }
    Ok(None)
  }

  pub async fn list_files(&self, include_deleted: bool) -> Result<Vec<ModelFile>> {
    let table = self.files_table().await?;
    let query = if include_deleted { table.query() } else { table.query().only_if("is_deleted = false") };
    let results: Vec<RecordBatch> = query.execute().await?.try_collect().await?;

    let mut files = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        files.push(batch_to_file(&batch, i)?);
      }
    }
    Ok(files)
  }

  pub async fn mark_file_deleted(&self, rel_path: &str) -> Result<()> {
    debug!(rel_path, "marking file deleted");
    let table = self.files_table().await?;
    table
      .update()
      .only_if(format!("rel_path = '{}'", escape(rel_path)))
      .column("is_deleted", "true")
      .execute()
      .await?;
    Ok(())
  }

  pub async fn file_count(&self) -> Result<usize> {
    let table = self.files_table().await?;
    Ok(table.count_rows(Some("is_deleted = false".to_string())).await?)
  }
}

fn escape(s: &str) -> String {
  s.replace('\'', "''")
}

fn file_to_batch(file: &ModelFile) -> Result<RecordBatch> {
  let batch = RecordBatch::try_new(
    files_schema(),
    vec![
      Arc::new(StringArray::from(vec![file.file_id.to_string()])),
      Arc::new(StringArray::from(vec![file.rel_path.clone()])),
      Arc::new(StringArray::from(vec![file.language.clone()])),
      Arc::new(UInt64Array::from(vec![file.size_bytes])),
      Arc::new(StringArray::from(vec![file.content_hash.clone()])),
      Arc::new(Int64Array::from(vec![file.last_modified_ms])),
      Arc::new(Int64Array::from(vec![file.indexed_at_ms])),
      Arc::new(StringArray::from(vec![status_to_str(file.status).to_string()])),
      Arc::new(BooleanArray::from(vec![file.is_deleted])),
    ],
  )?;
  Ok(batch)
}

fn status_to_str(status: FileStatus) -> &'static str {
  match status {
    FileStatus::Indexed => "indexed",
    FileStatus::Pending => "pending",
    FileStatus::Outdated => "outdated",
    FileStatus::Error => "error",
  }
}

fn str_to_status(s: &str) -> FileStatus {
  match s {
    "indexed" => FileStatus::Indexed,
    "outdated" => FileStatus::Outdated,
    "error" => FileStatus::Error,
    _ => FileStatus::Pending,
  }
}

fn batch_to_file(batch: &RecordBatch, row: usize) -> Result<ModelFile> {
  let get_str = |name: &str| -> Result<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .map(|a| a.value(row).to_string())
      .ok_or_else(|| StoreError::NotFound(format!("column {name}")))
  };
  let get_str_opt = |name: &str| -> Option<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .filter(|a| !a.is_null(row))
      .map(|a| a.value(row).to_string())
  };
  let get_u64 = |name: &str| -> Result<u64> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
      .map(|a| a.value(row))
      .ok_or_else(|| StoreError::NotFound(format!("column {name}")))
  };
  let get_i64 = |name: &str| -> Result<i64> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
      .map(|a| a.value(row))
      .ok_or_else(|| StoreError::NotFound(format!("column {name}")))
  };
  let get_bool = |name: &str| -> Result<bool> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
      .map(|a| a.value(row))
      .ok_or_else(|| StoreError::NotFound(format!("column {name}")))
  };

  Ok(ModelFile {
    file_id: Uuid::parse_str(&get_str("file_id")?).map_err(|_| StoreError::InvalidInput("bad file_id".into()))?,
    rel_path: get_str("rel_path")?,
    language: get_str_opt("language"),
    size_bytes: get_u64("size_bytes")?,
    content_hash: get_str("content_hash")?,
    last_modified_ms: get_i64("last_modified_ms")?,
    indexed_at_ms: get_i64("indexed_at_ms")?,
    status: str_to_status(&get_str("status")?),
    is_deleted: get_bool("is_deleted")?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  async fn store() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("t.lancedb"), 4).await.unwrap();
    (dir, store)
  }

  #[tokio::test]
  async fn upsert_then_get_round_trips() {
    let (_dir, store) = store().await;
    let file = ModelFile::new("a/b.rs", "hash1");
    store.upsert_file(&file).await.unwrap();
    let fetched = store.get_file_by_rel_path("a/b.rs").await.unwrap().unwrap();
    assert_eq!(fetched.content_hash, "hash1");
  }

  #[tokio::test]
  async fn upsert_replaces_existing_row_for_same_path() {
    let (_dir, store) = store().await;
    let mut file = ModelFile::new("a.rs", "hash1");
    store.upsert_file(&file).await.unwrap();
    file.content_hash = "hash2".to_string();
    store.upsert_file(&file).await.unwrap();

    let all = store.list_files(false).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].content_hash, "hash2");
  }

  #[tokio::test]
  async fn mark_deleted_excludes_from_default_listing() {
    let (_dir, store) = store().await;
    let file = ModelFile::new("gone.rs", "hash1");
    store.upsert_file(&file).await.unwrap();
    store.mark_file_deleted("gone.rs").await.unwrap();

    assert!(store.list_files(false).await.unwrap().is_empty());
    assert_eq!(store.list_files(true).await.unwrap().len(), 1);
  }
}
