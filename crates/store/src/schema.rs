//! Arrow schemas for the six LanceDB tables the Store owns.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

pub fn files_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("file_id", DataType::Utf8, false),
    Field::new("rel_path", DataType::Utf8, false),
    Field::new("language", DataType::Utf8, true),
    Field::new("size_bytes", DataType::UInt64, false),
    Field::new("content_hash", DataType::Utf8, false),
    Field::new("last_modified_ms", DataType::Int64, false),
    Field::new("indexed_at_ms", DataType::Int64, false),
    Field::new("status", DataType::Utf8, false),
    Field::new("is_deleted", DataType::Boolean, false),
  ]))
}

/// Chunk rows carry their own embedding vector as a column, the teacher's
/// convenience of collapsing the chunk and its embedding into one row; the
/// embedding's `dim`/`model_tag` ride alongside it rather than living in a
/// separate table.
pub fn chunks_schema(vector_dim: usize) -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("chunk_id", DataType::Utf8, false),
    Field::new("file_id", DataType::Utf8, false),
    Field::new("ordinal", DataType::UInt32, false),
    Field::new("kind", DataType::Utf8, false),
    Field::new("start_line", DataType::UInt32, false),
    Field::new("end_line", DataType::UInt32, false),
    Field::new("byte_start", DataType::UInt32, false),
    Field::new("byte_end", DataType::UInt32, false),
    Field::new("token_count", DataType::UInt32, false),
    Field::new("text", DataType::Utf8, false),
    Field::new("summary", DataType::Utf8, true),
    Field::new("embedding_model_tag", DataType::Utf8, true),
    Field::new("has_embedding", DataType::Boolean, false),
    Field::new(
      "vector",
      DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), vector_dim as i32),
      false,
    ),
  ]))
}

pub fn symbols_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("symbol_id", DataType::Utf8, false),
    Field::new("chunk_id", DataType::Utf8, false),
    Field::new("name", DataType::Utf8, false),
    Field::new("kind", DataType::Utf8, false),
    Field::new("qualified_name", DataType::Utf8, true),
  ]))
}

pub fn links_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("source_chunk_id", DataType::Utf8, false),
    Field::new("target_chunk_id", DataType::Utf8, false),
    Field::new("relation", DataType::Utf8, false),
  ]))
}

pub fn bootstrap_progress_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("rel_path", DataType::Utf8, false),
    Field::new("enqueued_at_ms", DataType::Int64, false),
    Field::new("state", DataType::Utf8, false),
    Field::new("attempts", DataType::UInt32, false),
  ]))
}

pub fn usage_metrics_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("chunk_id", DataType::Utf8, false),
    Field::new("hit_count", DataType::UInt64, false),
    Field::new("last_accessed_ms", DataType::Int64, false),
  ]))
}
