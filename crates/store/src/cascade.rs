//! File-level cascade delete and atomic artifact replacement.
//!
//! LanceDB has no foreign keys, so the delete ordering here (links ->
//! symbols -> usage_metrics -> chunks) is the only thing that keeps
//! dependent rows from outliving the chunks they reference. Embeddings
//! have no table of their own -- they ride as columns on the chunk row
//! (see `schema::chunks_schema`) -- so deleting a chunk row retires its
//! embedding implicitly; there is no separate embeddings step.

use context_core::{Chunk, Embedding, File as ModelFile, Link, Symbol, UsageMetric};
use tracing::{error, warn};
use uuid::Uuid;

use crate::connection::Store;
use crate::error::Result;

impl Store {
  /// Remove a file and everything that depends on it. Returns the number of
  /// chunks removed.
  pub async fn delete_file_cascade(&self, file_id: Uuid) -> Result<usize> {
    let _guard = self.write_lock.lock().await;
    let chunk_ids = self.get_chunks_for_file(file_id).await?.into_iter().map(|c| c.chunk_id).collect::<Vec<_>>();

    self.delete_links_for_chunks(&chunk_ids).await?;
    self.delete_symbols_for_chunks(&chunk_ids).await?;
    self.delete_usage_metrics_for_chunks(&chunk_ids).await?;
    let deleted = self.delete_chunks_for_file(file_id).await?;

    Ok(deleted.len())
  }

  /// Swap a file's chunks, embeddings and symbols for a freshly reindexed
  /// set as a single unit: if the file already has rows, delete its owned
  /// links, symbols, usage_metrics and chunks (in that order), then upsert
  /// the file row and insert the new chunks/symbols.
  ///
  /// LanceDB gives us no real cross-table transaction, so the "abort and
  /// preserve prior state" half is implemented by snapshotting every row
  /// about to be deleted before the delete runs, and re-inserting that
  /// snapshot if the write half fails.
  pub async fn replace_file_artifacts(
    &self,
    file: &ModelFile,
    chunks: &[(Chunk, Option<Embedding>)],
    symbols: &[Symbol],
  ) -> Result<()> {
    let _guard = self.write_lock.lock().await;

    let previous_file = self.get_file_by_id(file.file_id).await?;
    let previous_chunk_ids: Vec<Uuid> =
      self.get_chunks_for_file(file.file_id).await?.into_iter().map(|c| c.chunk_id).collect();

    let mut previous_chunks = Vec::with_capacity(previous_chunk_ids.len());
    for chunk_id in &previous_chunk_ids {
      if let Some(row) = self.get_chunk_by_id(*chunk_id).await? {
        previous_chunks.push(row);
      }
    }
    let previous_symbols = self.get_symbols_for_chunks(&previous_chunk_ids).await?;
    let previous_links = self.get_links_touching(&previous_chunk_ids).await?;
    let previous_usage = self.get_usage_metrics_for_chunks(&previous_chunk_ids).await?;

    if previous_file.is_some() {
      self.delete_links_for_chunks(&previous_chunk_ids).await?;
      self.delete_symbols_for_chunks(&previous_chunk_ids).await?;
      self.delete_usage_metrics_for_chunks(&previous_chunk_ids).await?;
      self.delete_chunks_for_file(file.file_id).await?;
    }

    self.upsert_file(file).await?;
    if let Err(err) = self.write_new_chunks_and_symbols(chunks, symbols).await {
      warn!(file_id = %file.file_id, %err, "replace_file_artifacts failed, restoring prior state");
      self
        .restore_previous_state(file.file_id, previous_file, previous_chunks, previous_symbols, previous_links, previous_usage)
        .await;
      return Err(err);
    }

    Ok(())
  }

  async fn write_new_chunks_and_symbols(&self, chunks: &[(Chunk, Option<Embedding>)], symbols: &[Symbol]) -> Result<()> {
    self.upsert_chunks(chunks).await?;
    if !symbols.is_empty() {
      self.insert_symbols(symbols).await?;
    }
    Ok(())
  }

  /// Best-effort restoration after a failed write half. Errors here are
  /// logged rather than propagated: the caller is already returning the
  /// original failure and has nothing further to roll back to.
  async fn restore_previous_state(
    &self,
    file_id: Uuid,
    previous_file: Option<ModelFile>,
    previous_chunks: Vec<(Chunk, Option<Embedding>)>,
    previous_symbols: Vec<Symbol>,
    previous_links: Vec<Link>,
    previous_usage: Vec<UsageMetric>,
  ) {
    if let Err(err) = self.delete_chunks_for_file(file_id).await {
      error!(%file_id, %err, "failed to clear partially-written chunks during rollback");
    }
    match previous_file {
      Some(file) => {
        if let Err(err) = self.upsert_file(&file).await {
          error!(%file_id, %err, "failed to restore file row during rollback");
        }
      }
      None => match self.files_table().await {
        Ok(table) => {
          if let Err(err) = table.delete(&format!("file_id = '{file_id}'")).await {
            error!(%file_id, %err, "failed to clear newly-written file row during rollback");
          }
        }
        Err(err) => error!(%file_id, %err, "failed to open files table during rollback"),
      },
    }
    if let Err(err) = self.upsert_chunks(&previous_chunks).await {
      error!(%file_id, %err, "failed to restore chunks during rollback");
    }
    if let Err(err) = self.insert_symbols(&previous_symbols).await {
      error!(%file_id, %err, "failed to restore symbols during rollback");
    }
    if let Err(err) = self.insert_links(&previous_links).await {
      error!(%file_id, %err, "failed to restore links during rollback");
    }
    if let Err(err) = self.insert_usage_metrics(&previous_usage).await {
      error!(%file_id, %err, "failed to restore usage metrics during rollback");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use context_core::{ChunkKind, SymbolKind};
  use tempfile::TempDir;

  #[tokio::test]
  async fn cascade_removes_chunks_symbols_and_links() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("t.lancedb"), 4).await.unwrap();

    let file = ModelFile::new("a.rs", "hash1");
    let file_id = file.file_id;
    store.upsert_file(&file).await.unwrap();

    let chunk = Chunk {
      chunk_id: Uuid::new_v4(),
      file_id,
      ordinal: 0,
      kind: ChunkKind::CodeFunction,
      start_line: 1,
      end_line: 1,
      byte_start: 0,
      byte_end: 1,
      token_count: 1,
      text: "fn a() {}".to_string(),
      summary: None,
    };
    store.upsert_chunk(&chunk, None).await.unwrap();

    let symbol = Symbol { symbol_id: Uuid::new_v4(), chunk_id: chunk.chunk_id, name: "a".to_string(), kind: SymbolKind::Function, qualified_name: None };
    store.insert_symbols(&[symbol]).await.unwrap();

    let other_chunk_id = Uuid::new_v4();
    store.insert_links(&[Link { source_chunk_id: chunk.chunk_id, target_chunk_id: other_chunk_id, relation: "calls".to_string() }]).await.unwrap();
    store.record_usage(chunk.chunk_id).await.unwrap();

    let removed = store.delete_file_cascade(file_id).await.unwrap();
    assert_eq!(removed, 1);

    assert!(store.get_chunks_for_file(file_id).await.unwrap().is_empty());
    assert!(store.get_symbols_for_chunks(&[chunk.chunk_id]).await.unwrap().is_empty());
    assert!(store.get_links_from(chunk.chunk_id).await.unwrap().is_empty());
    assert!(store.get_usage_metrics_for_chunks(&[chunk.chunk_id]).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn replace_file_artifacts_swaps_chunks_in_cascade_order() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("t.lancedb"), 4).await.unwrap();

    let mut file = ModelFile::new("a.rs", "hash1");
    file.status = context_core::FileStatus::Indexed;
    let file_id = file.file_id;
    store.upsert_file(&file).await.unwrap();

    let old_chunk = Chunk {
      chunk_id: Uuid::new_v4(),
      file_id,
      ordinal: 0,
      kind: ChunkKind::CodeFunction,
      start_line: 1,
      end_line: 1,
      byte_start: 0,
      byte_end: 1,
      token_count: 1,
      text: "fn old() {}".to_string(),
      summary: None,
    };
    store.upsert_chunk(&old_chunk, None).await.unwrap();
    store
      .insert_symbols(&[Symbol { symbol_id: Uuid::new_v4(), chunk_id: old_chunk.chunk_id, name: "old".to_string(), kind: SymbolKind::Function, qualified_name: None }])
      .await
      .unwrap();

    let new_chunk = Chunk {
      chunk_id: Uuid::new_v4(),
      file_id,
      ordinal: 0,
      kind: ChunkKind::CodeFunction,
      start_line: 1,
      end_line: 1,
      byte_start: 0,
      byte_end: 1,
      token_count: 1,
      text: "fn new() {}".to_string(),
      summary: None,
    };
    let new_symbol = Symbol { symbol_id: Uuid::new_v4(), chunk_id: new_chunk.chunk_id, name: "new".to_string(), kind: SymbolKind::Function, qualified_name: None };

    file.content_hash = "hash2".to_string();
    store.replace_file_artifacts(&file, &[(new_chunk.clone(), None)], &[new_symbol]).await.unwrap();

    let remaining = store.get_chunks_for_file(file_id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].chunk_id, new_chunk.chunk_id);
    assert!(store.get_symbols_for_chunks(&[old_chunk.chunk_id]).await.unwrap().is_empty());
    assert_eq!(store.get_symbols_for_chunks(&[new_chunk.chunk_id]).await.unwrap().len(), 1);
  }
}
