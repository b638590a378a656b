use std::sync::Arc;

use async_trait::async_trait;
use context_embedding::EmbeddingProvider;
use context_store::Store;

use super::{RankedChunk, SearchFilter, SearchProvider};
use crate::error::EngineError;

/// Embeds the query once, runs `Store::vector_search_chunks`, and converts
/// LanceDB's L2 distance over unit-normalized vectors into cosine similarity
/// (`cos = 1 - distance / 2`), clamped to `[-1, 1]`.
pub struct SemanticProvider {
  store: Arc<Store>,
  embedder: Arc<dyn EmbeddingProvider>,
  enabled: bool,
  weight: f32,
}

impl SemanticProvider {
  pub fn new(store: Arc<Store>, embedder: Arc<dyn EmbeddingProvider>, enabled: bool, weight: f32) -> Self {
    Self { store, embedder, enabled, weight }
  }
}

#[async_trait]
impl SearchProvider for SemanticProvider {
  fn name(&self) -> &str {
    "semantic"
  }

  fn weight(&self) -> f32 {
    self.weight
  }

  fn enabled(&self) -> bool {
    self.enabled
  }

  async fn search(&self, query: &str, filter: &SearchFilter, k: usize) -> Result<Vec<RankedChunk>, EngineError> {
    let query_vector = self.embedder.embed(query).await?;
    // Over-fetch since filtering happens after the ANN search returns.
    let raw = self.store.vector_search_chunks(&query_vector, (k * 4).max(k)).await?;

    let mut out = Vec::new();
    for (chunk, distance) in raw {
      let file = self.store.get_file_by_id(chunk.file_id).await.ok().flatten();
      if !filter.matches(&chunk, file.as_ref()) {
        continue;
      }
      let cosine = (1.0 - distance / 2.0).clamp(-1.0, 1.0);
      out.push(RankedChunk { chunk_id: chunk.chunk_id, score: cosine });
      if out.len() >= k {
        break;
      }
    }
    Ok(out)
  }
}
