use arrow_array::{Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray, UInt64Array};
use context_core::UsageMetric;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;
use uuid::Uuid;

use crate::connection::Store;
use crate::error::{Result, StoreError};
use crate::schema::usage_metrics_schema;

impl Store {
  /// Bump the hit counter for `chunk_id`, inserting a fresh row the first
  /// time it's seen. Best-effort bookkeeping: callers treat a failure here
  /// as non-fatal to the search request that triggered it.
  pub async fn record_usage(&self, chunk_id: Uuid) -> Result<()> {
    let table = self.usage_metrics_table().await?;
    let existing = self.get_usage_metrics_for_chunks(&[chunk_id]).await?;
    table.delete(&format!("chunk_id = '{chunk_id}'")).await?;

    let metric = match existing.into_iter().next() {
      Some(mut m) => {
        m.hit_count += 1;
        m.last_accessed_ms = context_core::model::now_ms();
        m
      }
      None => UsageMetric::new(chunk_id),
    };

    let batch = usage_metrics_to_batch(&[metric])?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], usage_metrics_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn get_usage_metrics_for_chunks(&self, chunk_ids: &[Uuid]) -> Result<Vec<UsageMetric>> {
    if chunk_ids.is_empty() {
      return Ok(Vec::new());
    }
    let table = self.usage_metrics_table().await?;
    let filter = in_clause("chunk_id", chunk_ids);
    let results: Vec<RecordBatch> = table.query().only_if(filter).execute().await?.try_collect().await?;

    let mut out = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        out.push(batch_to_usage_metric(&batch, i)?);
      }
    }
    Ok(out)
  }

  /// Delete usage rows for chunks being removed. Runs before the chunk rows
  /// themselves are deleted, per the store's mandatory cascade order.
  pub async fn delete_usage_metrics_for_chunks(&self, chunk_ids: &[Uuid]) -> Result<()> {
    if chunk_ids.is_empty() {
      return Ok(());
    }
    let table = self.usage_metrics_table().await?;
    table.delete(&in_clause("chunk_id", chunk_ids)).await?;
    Ok(())
  }

  pub async fn insert_usage_metrics(&self, metrics: &[UsageMetric]) -> Result<()> {
    if metrics.is_empty() {
      return Ok(());
    }
    let table = self.usage_metrics_table().await?;
    let batch = usage_metrics_to_batch(metrics)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], usage_metrics_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }
}

fn in_clause(column: &str, ids: &[Uuid]) -> String {
  let list = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(", ");
  format!("{column} IN ({list})")
}

fn usage_metrics_to_batch(metrics: &[UsageMetric]) -> Result<RecordBatch> {
  let chunk_ids: Vec<String> = metrics.iter().map(|m| m.chunk_id.to_string()).collect();
  let hit_counts: Vec<u64> = metrics.iter().map(|m| m.hit_count).collect();
  let last_accessed: Vec<i64> = metrics.iter().map(|m| m.last_accessed_ms).collect();

  let batch = RecordBatch::try_new(
    usage_metrics_schema(),
    vec![Arc::new(StringArray::from(chunk_ids)), Arc::new(UInt64Array::from(hit_counts)), Arc::new(Int64Array::from(last_accessed))],
  )?;
  Ok(batch)
}

fn batch_to_usage_metric(batch: &RecordBatch, row: usize) -> Result<UsageMetric> {
  let chunk_id = batch
    .column_by_name("chunk_id")
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    .map(|a| a.value(row).to_string())
    .ok_or_else(|| StoreError::NotFound("column chunk_id".to_string()))?;
  let hit_count = batch
    .column_by_name("hit_count")
    .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| StoreError::NotFound("column hit_count".to_string()))?;
  let last_accessed_ms = batch
    .column_by_name("last_accessed_ms")
    .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| StoreError::NotFound("column last_accessed_ms".to_string()))?;

  Ok(UsageMetric {
    chunk_id: Uuid::parse_str(&chunk_id).map_err(|_| StoreError::InvalidInput("bad chunk_id".into()))?,
    hit_count,
    last_accessed_ms,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn record_usage_inserts_then_increments() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("t.lancedb"), 4).await.unwrap();
    let chunk_id = Uuid::new_v4();

    store.record_usage(chunk_id).await.unwrap();
    store.record_usage(chunk_id).await.unwrap();

    let rows = store.get_usage_metrics_for_chunks(&[chunk_id]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].hit_count, 2);
  }

  #[tokio::test]
  async fn delete_for_chunks_removes_only_matching_rows() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("t.lancedb"), 4).await.unwrap();

    let keep_chunk = Uuid::new_v4();
    let drop_chunk = Uuid::new_v4();
    store.record_usage(keep_chunk).await.unwrap();
    store.record_usage(drop_chunk).await.unwrap();

    store.delete_usage_metrics_for_chunks(&[drop_chunk]).await.unwrap();

    assert_eq!(store.get_usage_metrics_for_chunks(&[keep_chunk]).await.unwrap().len(), 1);
    assert!(store.get_usage_metrics_for_chunks(&[drop_chunk]).await.unwrap().is_empty());
  }
}
