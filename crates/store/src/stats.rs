use context_core::StoreStats;

use crate::connection::Store;
use crate::error::Result;

impl Store {
  pub async fn stats(&self) -> Result<StoreStats> {
    let files = self.list_files(false).await?;
    let chunk_count = self.chunk_count().await?;
    let embedding_count = self.count_embedded_chunks().await?;

    let mut language_distribution = std::collections::BTreeMap::new();
    for file in &files {
      let key = file.language.clone().unwrap_or_else(|| "unknown".to_string());
      *language_distribution.entry(key).or_insert(0u64) += 1;
    }

    Ok(StoreStats {
      files: files.len() as u64,
      chunks: chunk_count as u64,
      embeddings: embedding_count as u64,
      language_distribution,
      provider_status: std::collections::BTreeMap::new(),
    })
  }

  async fn count_embedded_chunks(&self) -> Result<usize> {
    let table = self.chunks_table().await?;
    Ok(table.count_rows(Some("has_embedding = true".to_string())).await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use context_core::{Chunk, ChunkKind, File as ModelFile};
  use tempfile::TempDir;
  use uuid::Uuid;

  #[tokio::test]
  async fn stats_reflect_files_and_chunks() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("t.lancedb"), 4).await.unwrap();

    let mut file = ModelFile::new("a.rs", "hash1");
    file.language = Some("rust".to_string());
    let file_id = file.file_id;
    store.upsert_file(&file).await.unwrap();

    let chunk = Chunk {
      chunk_id: Uuid::new_v4(),
      file_id,
      ordinal: 0,
      kind: ChunkKind::CodeFunction,
      start_line: 1,
      end_line: 2,
      byte_start: 0,
      byte_end: 5,
      token_count: 2,
      text: "fn a() {}".to_string(),
      summary: None,
    };
    store.upsert_chunk(&chunk, None).await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.chunks, 1);
    assert_eq!(stats.embeddings, 0);
    assert_eq!(stats.language_distribution.get("rust"), Some(&1));
  }
}
