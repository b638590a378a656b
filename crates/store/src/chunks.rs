use arrow_array::{
  Array, BooleanArray, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array,
};
use context_core::{Chunk, ChunkKind, Embedding};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::connection::Store;
use crate::error::{Result, StoreError};
use crate::schema::chunks_schema;

impl Store {
  /// Insert or replace a chunk row, optionally carrying its embedding vector.
  pub async fn upsert_chunk(&self, chunk: &Chunk, embedding: Option<&Embedding>) -> Result<()> {
    trace!(chunk_id = %chunk.chunk_id, has_embedding = embedding.is_some(), "upserting chunk");
    let table = self.chunks_table().await?;
    table.delete(&format!("chunk_id = '{}'", chunk.chunk_id)).await?;

    let batch = chunk_to_batch(chunk, embedding, self.vector_dim)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], chunks_schema(self.vector_dim));
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn upsert_chunks(&self, rows: &[(Chunk, Option<Embedding>)]) -> Result<()> {
    if rows.is_empty() {
      return Ok(());
    }
    let table = self.chunks_table().await?;
    let batches: Vec<_> = rows
      .iter()
      .map(|(chunk, emb)| chunk_to_batch(chunk, emb.as_ref(), self.vector_dim))
      .collect::<Result<Vec<_>>>()?;
    let iter = RecordBatchIterator::new(batches.into_iter().map(Ok), chunks_schema(self.vector_dim));
    table.add(Box::new(iter)).execute().await?;
    Ok(())
  }

  pub async fn get_chunks_for_file(&self, file_id: Uuid) -> Result<Vec<Chunk>> {
    let table = self.chunks_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("file_id = '{}'", file_id))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut chunks = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        chunks.push(batch_to_chunk(&batch, i)?);
      }
    }
    chunks.sort_by_key(|c| c.ordinal);
    Ok(chunks)
  }

  /// Delete all chunks belonging to a file, returning the deleted chunk ids
  /// so the caller can cascade into `symbols`/`links`.
  pub async fn delete_chunks_for_file(&self, file_id: Uuid) -> Result<Vec<Uuid>> {
    debug!(%file_id, "deleting chunks for file");
    let chunk_ids: Vec<Uuid> = self.get_chunks_for_file(file_id).await?.into_iter().map(|c| c.chunk_id).collect();
    let table = self.chunks_table().await?;
    table.delete(&format!("file_id = '{}'", file_id)).await?;
    Ok(chunk_ids)
  }

  pub async fn vector_search_chunks(&self, query_vector: &[f32], limit: usize) -> Result<Vec<(Chunk, f32)>> {
    let table = self.chunks_table().await?;
    let query = table
      .vector_search(query_vector.to_vec())?
      .limit(limit)
      .only_if("has_embedding = true");
    let results: Vec<RecordBatch> = query.execute().await?.try_collect().await?;

    let mut out = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        let chunk = batch_to_chunk(&batch, i)?;
        let distance = batch
          .column_by_name("_distance")
          .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
          .map(|a| a.value(i))
          .unwrap_or(0.0);
        out.push((chunk, distance));
      }
    }
    Ok(out)
  }

  pub async fn chunk_count(&self) -> Result<usize> {
    let table = self.chunks_table().await?;
    Ok(table.count_rows(None).await?)
  }

  pub async fn get_chunk_by_id(&self, chunk_id: Uuid) -> Result<Option<(Chunk, Option<Embedding>)>> {
    let table = self.chunks_table().await?;
    let results: Vec<RecordBatch> =
      table.query().only_if(format!("chunk_id = '{chunk_id}'")).execute().await?.try_collect().await?;
    for batch in &results {
      if batch.num_rows() > 0 {
        let chunk = batch_to_chunk(batch, 0)?;
        let embedding = extract_embedding(batch, 0, self.vector_dim);
        return Ok(Some((chunk, embedding)));
      }
    }
    Ok(None)
  }

  /// All chunks across every file, for providers that scan the whole corpus
  /// (symbol lookup, full-text BM25) rather than query by a single file.
  pub async fn list_all_chunks(&self) -> Result<Vec<Chunk>> {
    let table = self.chunks_table().await?;
    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;
    let mut chunks = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        chunks.push(batch_to_chunk(&batch, i)?);
      }
    }
    Ok(chunks)
  }
}

fn kind_to_str(kind: ChunkKind) -> &'static str {
  match kind {
    ChunkKind::CodeClass => "code_class",
    ChunkKind::CodeFunction => "code_function",
    ChunkKind::CodeBlock => "code_block",
    ChunkKind::DocSection => "doc_section",
    ChunkKind::DocParagraph => "doc_paragraph",
    ChunkKind::Text => "text",
  }
}

fn str_to_kind(s: &str) -> ChunkKind {
  match s {
    "code_class" => ChunkKind::CodeClass,
    "code_function" => ChunkKind::CodeFunction,
    "doc_section" => ChunkKind::DocSection,
    "doc_paragraph" => ChunkKind::DocParagraph,
    "text" => ChunkKind::Text,
    _ => ChunkKind::CodeBlock,
  }
}

fn chunk_to_batch(chunk: &Chunk, embedding: Option<&Embedding>, vector_dim: usize) -> Result<RecordBatch> {
  let (vector_values, model_tag, has_embedding) = match embedding {
    Some(e) => {
      let mut v = e.vector.clone();
      v.resize(vector_dim, 0.0);
      (v, Some(e.model_tag.clone()), true)
    }
    None => (vec![0.0f32; vector_dim], None, false),
  };

  let field = Arc::new(arrow_schema::Field::new("item", arrow_schema::DataType::Float32, true));
  let vector_list = FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(Float32Array::from(vector_values)), None)?;

  let batch = RecordBatch::try_new(
    chunks_schema(vector_dim),
    vec![
      Arc::new(StringArray::from(vec![chunk.chunk_id.to_string()])),
      Arc::new(StringArray::from(vec![chunk.file_id.to_string()])),
      Arc::new(UInt32Array::from(vec![chunk.ordinal])),
      Arc::new(StringArray::from(vec![kind_to_str(chunk.kind).to_string()])),
      Arc::new(UInt32Array::from(vec![chunk.start_line])),
      Arc::new(UInt32Array::from(vec![chunk.end_line])),
      Arc::new(UInt32Array::from(vec![chunk.byte_start])),
      Arc::new(UInt32Array::from(vec![chunk.byte_end])),
      Arc::new(UInt32Array::from(vec![chunk.token_count])),
      Arc::new(StringArray::from(vec![chunk.text.clone()])),
      Arc::new(StringArray::from(vec![chunk.summary.clone()])),
      Arc::new(StringArray::from(vec![model_tag])),
      Arc::new(BooleanArray::from(vec![has_embedding])),
      Arc::new(vector_list),
    ],
  )?;
  Ok(batch)
}

fn batch_to_chunk(batch: &RecordBatch, row: usize) -> Result<Chunk> {
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
  let get_u32 = |name: &str| -> Result<u32> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
      .map(|a| a.value(row))
      .ok_or_else(|| StoreError::NotFound(format!("column {name}")))
  };

  Ok(Chunk {
    chunk_id: Uuid::parse_str(&get_str("chunk_id")?).map_err(|_| StoreError::InvalidInput("bad chunk_id".into()))?,
    file_id: Uuid::parse_str(&get_str("file_id")?).map_err(|_| StoreError::InvalidInput("bad file_id".into()))?,
    ordinal: get_u32("ordinal")?,
    kind: str_to_kind(&get_str("kind")?),
    start_line: get_u32("start_line")?,
    end_line: get_u32("end_line")?,
    byte_start: get_u32("byte_start")?,
    byte_end: get_u32("byte_end")?,
    token_count: get_u32("token_count")?,
    text: get_str("text")?,
    summary: get_str_opt("summary"),
  })
}

/// Extract the stored embedding for a chunk row, if `has_embedding` is set.
pub fn extract_embedding(batch: &RecordBatch, row: usize, vector_dim: usize) -> Option<Embedding> {
  let has_embedding = batch
    .column_by_name("has_embedding")
    .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
    .map(|a| a.value(row))
    .unwrap_or(false);
  if !has_embedding {
    return None;
  }
  let chunk_id = batch
    .column_by_name("chunk_id")
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    .and_then(|a| Uuid::parse_str(a.value(row)).ok())?;
  let model_tag = batch
    .column_by_name("embedding_model_tag")
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    .filter(|a| !a.is_null(row))
    .map(|a| a.value(row).to_string())
    .unwrap_or_default();
  let vector = batch
    .column_by_name("vector")
    .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
    .map(|arr| {
      let values = arr.value(row);
      let float_arr = values.as_any().downcast_ref::<Float32Array>().unwrap();
      (0..vector_dim).map(|i| float_arr.value(i)).collect::<Vec<f32>>()
    })?;
  Some(Embedding { chunk_id, dim: vector_dim as u32, vector, model_tag })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn sample_chunk(file_id: Uuid, ordinal: u32) -> Chunk {
    Chunk {
      chunk_id: Uuid::new_v4(),
      file_id,
      ordinal,
      kind: ChunkKind::Text,
      start_line: 1,
      end_line: 2,
      byte_start: 0,
      byte_end: 10,
      token_count: 3,
      text: "hello world".to_string(),
      summary: None,
    }
  }

  async fn store() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("t.lancedb"), 4).await.unwrap();
    (dir, store)
  }

  #[tokio::test]
  async fn upsert_and_list_for_file_preserves_ordinal_order() {
    let (_dir, store) = store().await;
    let file_id = Uuid::new_v4();
    let c0 = sample_chunk(file_id, 0);
    let c1 = sample_chunk(file_id, 1);
    store.upsert_chunk(&c1, None).await.unwrap();
    store.upsert_chunk(&c0, None).await.unwrap();

    let chunks = store.get_chunks_for_file(file_id).await.unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].ordinal, 0);
    assert_eq!(chunks[1].ordinal, 1);
  }

  #[tokio::test]
  async fn delete_for_file_returns_deleted_ids() {
    let (_dir, store) = store().await;
    let file_id = Uuid::new_v4();
    let c0 = sample_chunk(file_id, 0);
    let expected_id = c0.chunk_id;
    store.upsert_chunk(&c0, None).await.unwrap();

    let deleted = store.delete_chunks_for_file(file_id).await.unwrap();
    assert_eq!(deleted, vec![expected_id]);
    assert!(store.get_chunks_for_file(file_id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn upsert_with_embedding_round_trips_vector() {
    let (_dir, store) = store().await;
    let file_id = Uuid::new_v4();
    let chunk = sample_chunk(file_id, 0);
    let embedding = Embedding { chunk_id: chunk.chunk_id, dim: 4, vector: vec![0.1, 0.2, 0.3, 0.4], model_tag: "bge-small-en-v1.5".to_string() };
    store.upsert_chunk(&chunk, Some(&embedding)).await.unwrap();

    let results = store.vector_search_chunks(&[0.1, 0.2, 0.3, 0.4], 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0.chunk_id, chunk.chunk_id);
  }
}
