pub mod full_text;
pub mod semantic;
pub mod symbol;

pub use full_text::FullTextProvider;
pub use semantic::SemanticProvider;
pub use symbol::SymbolProvider;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use context_core::{Chunk, ChunkKind, File};
use context_store::Store;
use uuid::Uuid;

use crate::error::EngineError;

/// Narrows a provider's corpus scan. All four fields default to "no
/// restriction"; an empty `Vec` always means "match everything" for that
/// field, never "match nothing".
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
  pub paths: Vec<String>,
  pub languages: Vec<String>,
  pub kinds: Vec<ChunkKind>,
  pub exclude_patterns: Vec<String>,
}

impl SearchFilter {
  pub fn matches(&self, chunk: &Chunk, file: Option<&File>) -> bool {
    if !self.kinds.is_empty() && !self.kinds.contains(&chunk.kind) {
      return false;
    }
    let Some(file) = file else { return self.paths.is_empty() && self.languages.is_empty() };

    if !self.languages.is_empty() {
      let lang = file.language.as_deref().unwrap_or("");
      if !self.languages.iter().any(|l| l.eq_ignore_ascii_case(lang)) {
        return false;
      }
    }
    if !self.paths.is_empty() && !self.paths.iter().any(|p| path_matches(p, &file.rel_path)) {
      return false;
    }
    if self.exclude_patterns.iter().any(|p| path_matches(p, &file.rel_path)) {
      return false;
    }
    true
  }
}

/// Exact/ancestor match for plain path prefixes; glob syntax (`*`, `?`, `[]`)
/// is matched via the same gitignore-style glob engine `PathPolicy` uses.
fn path_matches(pattern: &str, rel_path: &str) -> bool {
  if pattern == rel_path || Path::new(rel_path).starts_with(pattern) {
    return true;
  }
  if pattern.contains(['*', '?', '[']) {
    let mut builder = ignore::gitignore::GitignoreBuilder::new(Path::new(""));
    if builder.add_line(None, pattern).is_ok() {
      if let Ok(gi) = builder.build() {
        return gi.matched(rel_path, false).is_ignore();
      }
    }
  }
  false
}

#[derive(Debug, Clone)]
pub struct RankedChunk {
  pub chunk_id: Uuid,
  pub score: f32,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
  fn name(&self) -> &str;
  fn weight(&self) -> f32;
  fn enabled(&self) -> bool;
  async fn search(&self, query: &str, filter: &SearchFilter, k: usize) -> Result<Vec<RankedChunk>, EngineError>;
}

/// Prefetches every chunk and its owning file once per query, so each
/// provider filters in memory instead of issuing its own store round trips.
pub struct Corpus {
  pub chunks: Vec<Chunk>,
  pub files_by_id: HashMap<Uuid, File>,
}

impl Corpus {
  pub async fn load(store: &Arc<Store>) -> Result<Self, EngineError> {
    let chunks = store.list_all_chunks().await?;
    let files = store.list_files(false).await?;
    let files_by_id = files.into_iter().map(|f| (f.file_id, f)).collect();
    Ok(Self { chunks, files_by_id })
  }

  pub fn file_for(&self, chunk: &Chunk) -> Option<&File> {
    self.files_by_id.get(&chunk.file_id)
  }

  pub fn filtered(&self, filter: &SearchFilter) -> Vec<&Chunk> {
    self.chunks.iter().filter(|c| filter.matches(c, self.file_for(c))).collect()
  }
}
