use std::path::{Path, PathBuf};
use std::sync::Arc;

use context_core::{Chunk, Config, File as ModelFile, FileStatus, Language, Symbol, SymbolKind, hash::content_hash};
use context_embedding::EmbeddingProvider;
use context_index::{Chunker, ChunkerConfig, PathPolicy};
use context_parser::{DefinitionKind, TreeSitterParser};
use context_store::Store;
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::EngineError;

/// What happened to a path after a call to [`Indexer::index_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
  Indexed { chunks: usize },
  Unchanged,
  Skipped(String),
}

/// Indexes one path at a time per the Indexer component: classify, hash,
/// shortcut on an unchanged hash, chunk, embed, extract symbols, then replace
/// the file's artifacts in the store atomically from the caller's view.
///
/// Work on the same `rel_path` is serialized via a per-path lock so that a
/// watcher-triggered reindex and a bootstrap worker never race each other.
pub struct Indexer {
  config: Config,
  store: Arc<Store>,
  embedder: Arc<dyn EmbeddingProvider>,
  locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl Indexer {
  pub fn new(config: Config, store: Arc<Store>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
    Self { config, store, embedder, locks: DashMap::new() }
  }

  fn lock_for(&self, rel_path: &str) -> Arc<AsyncMutex<()>> {
    self.locks.entry(rel_path.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
  }

  fn resolve_abs_path(&self, rel_path: &str) -> Option<PathBuf> {
    for root in &self.config.watch_roots {
      let candidate = Path::new(root).join(rel_path);
      if candidate.exists() {
        return Some(candidate);
      }
    }
    self.config.watch_roots.first().map(|root| Path::new(root).join(rel_path))
  }

  /// Step-by-step per §4.6. Returns `Ok` even when the path is skipped; only
  /// unexpected I/O/store/embedding failures are errors, and those mark the
  /// file ERROR in the store rather than propagating to the caller's batch.
  pub async fn index_path(&self, rel_path: &str) -> Result<IndexOutcome, EngineError> {
    let lock = self.lock_for(rel_path);
    let _guard = lock.lock().await;
    self.index_path_locked(rel_path).await
  }

  async fn index_path_locked(&self, rel_path: &str) -> Result<IndexOutcome, EngineError> {
    let Some(abs_path) = self.resolve_abs_path(rel_path) else {
      return Ok(IndexOutcome::Skipped("out_of_root".to_string()));
    };

    // 1. classify
    let decision = PathPolicy::new(&self.config).classify(&abs_path);
    if !decision.is_index() {
      return Ok(IndexOutcome::Skipped(format!("{decision:?}")));
    }

    // 2. hash
    let bytes = match tokio::fs::read(&abs_path).await {
      Ok(b) => b,
      Err(err) => {
        self.mark_error(rel_path).await;
        return Err(EngineError::Filesystem(err));
      }
    };
    let new_hash = content_hash(&bytes);

    // 3. lookup-unchanged shortcut
    let existing = self.store.get_file_by_rel_path(rel_path).await?;
    if let Some(existing) = &existing {
      if existing.content_hash == new_hash && !existing.is_deleted {
        debug!(rel_path, "content hash unchanged, skipping reindex");
        return Ok(IndexOutcome::Unchanged);
      }
    }

    let result = self.reindex(rel_path, &abs_path, &bytes, new_hash, existing).await;
    if result.is_err() {
      self.mark_error(rel_path).await;
    }
    result
  }

  async fn reindex(
    &self,
    rel_path: &str,
    abs_path: &Path,
    bytes: &[u8],
    new_hash: String,
    existing: Option<ModelFile>,
  ) -> Result<IndexOutcome, EngineError> {
    // 4. decode UTF-8
    let text = String::from_utf8_lossy(bytes).into_owned();
    let language = detect_language(abs_path);

    // 5. chunk
    let file_id = existing.as_ref().map(|f| f.file_id).unwrap_or_else(Uuid::new_v4);
    let mut chunker = Chunker::new(ChunkerConfig {
      max_tokens: self.config.chunking.for_language(language.as_str()).max_tokens,
      overlap_percent: self.config.chunking.for_language(language.as_str()).overlap_percent,
      ..ChunkerConfig::default()
    });
    let chunks = chunker.chunk(file_id, &text, language);

    // 6. embed in batches
    let embeddings = self.embed_chunks(&chunks).await?;

    // 7. extract symbols
    let mut parser = TreeSitterParser::new();
    let symbols = extract_symbols(&mut parser, &text, language, &chunks);

    // 8. replace artifacts, atomically, in the store's mandated cascade order
    let now = context_core::model::now_ms();
    let mut file = existing.unwrap_or_else(|| ModelFile::new(rel_path, new_hash.clone()));
    file.content_hash = new_hash;
    file.language = Some(language.as_str().to_string());
    file.size_bytes = bytes.len() as u64;
    file.last_modified_ms = now;
    file.indexed_at_ms = now;
    file.status = FileStatus::Indexed;
    file.is_deleted = false;

    let rows: Vec<_> = chunks.iter().cloned().zip(embeddings.into_iter().map(Some)).collect();
    self.store.replace_file_artifacts(&file, &rows, &symbols).await?;

    Ok(IndexOutcome::Indexed { chunks: chunks.len() })
  }

  async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<context_core::Embedding>, EngineError> {
    if chunks.is_empty() {
      return Ok(Vec::new());
    }
    let batch_size = self.config.embedding.batch_size.max(1);
    let mut out = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size) {
      let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
      let vectors = self.embedder.embed_batch(&texts).await?;
      for (chunk, vector) in batch.iter().zip(vectors) {
        out.push(context_core::Embedding {
          chunk_id: chunk.chunk_id,
          dim: vector.len() as u32,
          vector,
          model_tag: self.embedder.model_id().to_string(),
        });
      }
    }
    Ok(out)
  }

  async fn mark_error(&self, rel_path: &str) {
    if let Ok(Some(mut file)) = self.store.get_file_by_rel_path(rel_path).await {
      file.status = FileStatus::Error;
      if let Err(err) = self.store.upsert_file(&file).await {
        warn!(rel_path, %err, "failed to persist ERROR status");
      }
    }
  }

  /// Cascade-delete a path's artifacts and tombstone its file row.
  pub async fn delete_path(&self, rel_path: &str) -> Result<(), EngineError> {
    let lock = self.lock_for(rel_path);
    let _guard = lock.lock().await;
    if let Some(file) = self.store.get_file_by_rel_path(rel_path).await? {
      self.store.delete_file_cascade(file.file_id).await?;
      self.store.mark_file_deleted(rel_path).await?;
    }
    Ok(())
  }

  /// A rename with unchanged content preserves chunk/embedding rows; only
  /// the file row's `rel_path` and mtime move.
  pub async fn rename_path(&self, from: &str, to: &str) -> Result<(), EngineError> {
    let lock = self.lock_for(from);
    let _guard = lock.lock().await;
    if let Some(mut file) = self.store.get_file_by_rel_path(from).await? {
      self.store.mark_file_deleted(from).await?;
      file.rel_path = to.to_string();
      file.last_modified_ms = context_core::model::now_ms();
      self.store.upsert_file(&file).await?;
    } else {
      drop(_guard);
      self.index_path(to).await?;
    }
    Ok(())
  }
}

fn detect_language(abs_path: &Path) -> Language {
  abs_path.extension().and_then(|e| e.to_str()).and_then(Language::from_extension).unwrap_or(Language::PlainText)
}

fn extract_symbols(parser: &mut TreeSitterParser, text: &str, language: Language, chunks: &[Chunk]) -> Vec<Symbol> {
  if language.is_markdown() {
    return chunks
      .iter()
      .filter(|c| matches!(c.kind, context_core::ChunkKind::DocSection))
      .map(|c| Symbol {
        symbol_id: Uuid::new_v4(),
        chunk_id: c.chunk_id,
        name: c.text.lines().next().unwrap_or("").trim_start_matches('#').trim().to_string(),
        kind: SymbolKind::Heading,
        qualified_name: None,
      })
      .collect();
  }

  if !parser.supports_language(language) {
    return Vec::new();
  }
  let definitions = parser.extract_definitions(text, language);
  definitions
    .into_iter()
    .filter_map(|def| {
      let chunk = chunks.iter().find(|c| def.start_line >= c.start_line && def.start_line <= c.end_line)?;
      Some(Symbol {
        symbol_id: Uuid::new_v4(),
        chunk_id: chunk.chunk_id,
        name: def.name.clone(),
        kind: definition_kind_to_symbol_kind(def.kind),
        qualified_name: None,
      })
    })
    .collect()
}

fn definition_kind_to_symbol_kind(kind: DefinitionKind) -> SymbolKind {
  match kind {
    DefinitionKind::Class | DefinitionKind::Struct | DefinitionKind::Interface | DefinitionKind::Trait | DefinitionKind::Enum => {
      SymbolKind::Class
    }
    DefinitionKind::Method => SymbolKind::Method,
    DefinitionKind::Function => SymbolKind::Function,
    DefinitionKind::Const | DefinitionKind::Type | DefinitionKind::Module => SymbolKind::Variable,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use context_embedding::LocalEmbeddingProvider;
  use tempfile::TempDir;

  async fn test_indexer() -> (TempDir, Indexer) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.watch_roots = vec![dir.path().to_string_lossy().to_string()];
    let store = Arc::new(Store::open(dir.path().join("t.lancedb"), 384).await.unwrap());
    let embedder: Arc<dyn EmbeddingProvider> =
      Arc::new(LocalEmbeddingProvider::new("bge-small-en-v1.5", 384, true, 32).unwrap());
    (dir, Indexer::new(config, store, embedder))
  }

  #[tokio::test]
  async fn indexes_a_new_file() {
    let (dir, indexer) = test_indexer().await;
    tokio::fs::write(dir.path().join("a.md"), "# Title\n\nhello world\n").await.unwrap();
    let outcome = indexer.index_path("a.md").await.unwrap();
    assert!(matches!(outcome, IndexOutcome::Indexed { .. }));
  }

  #[tokio::test]
  async fn reindexing_unchanged_content_is_a_shortcut() {
    let (dir, indexer) = test_indexer().await;
    tokio::fs::write(dir.path().join("a.md"), "# Title\n\nhello\n").await.unwrap();
    indexer.index_path("a.md").await.unwrap();
    let outcome = indexer.index_path("a.md").await.unwrap();
    assert_eq!(outcome, IndexOutcome::Unchanged);
  }

  #[tokio::test]
  async fn delete_path_tombstones_the_file() {
    let (dir, indexer) = test_indexer().await;
    tokio::fs::write(dir.path().join("a.md"), "# Title\n\nhello\n").await.unwrap();
    indexer.index_path("a.md").await.unwrap();
    indexer.delete_path("a.md").await.unwrap();
    let file = indexer.store.get_file_by_rel_path("a.md").await.unwrap();
    assert!(file.is_none());
  }
}
