use arrow_array::{Array, RecordBatch, RecordBatchIterator, StringArray};
use context_core::Link;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;
use uuid::Uuid;

use crate::connection::Store;
use crate::error::{Result, StoreError};
use crate::schema::links_schema;

impl Store {
  pub async fn insert_links(&self, links: &[Link]) -> Result<()> {
    if links.is_empty() {
      return Ok(());
    }
    let table = self.links_table().await?;
    let batch = links_to_batch(links)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], links_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn get_links_from(&self, source_chunk_id: Uuid) -> Result<Vec<Link>> {
    let table = self.links_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("source_chunk_id = '{source_chunk_id}'"))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut out = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        out.push(batch_to_link(&batch, i)?);
      }
    }
    Ok(out)
  }

  /// All links where `chunk_ids` appears as source or target. Used to snapshot
  /// the rows a cascade delete is about to remove, for rollback.
  pub async fn get_links_touching(&self, chunk_ids: &[Uuid]) -> Result<Vec<Link>> {
    if chunk_ids.is_empty() {
      return Ok(Vec::new());
    }
    let list = chunk_ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(", ");
    let table = self.links_table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("source_chunk_id IN ({list}) OR target_chunk_id IN ({list})"))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut out = Vec::new();
    for batch in &results {
      for i in 0..batch.num_rows() {
        out.push(batch_to_link(batch, i)?);
      }
    }
    Ok(out)
  }

  /// Delete any link whose source or target references a chunk being
  /// removed. Must run before the chunk rows themselves are deleted.
  pub async fn delete_links_for_chunks(&self, chunk_ids: &[Uuid]) -> Result<()> {
    if chunk_ids.is_empty() {
      return Ok(());
    }
    let list = chunk_ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(", ");
    let table = self.links_table().await?;
    table
      .delete(&format!("source_chunk_id IN ({list}) OR target_chunk_id IN ({list})"))
      .await?;
    Ok(())
  }
}

fn links_to_batch(links: &[Link]) -> Result<RecordBatch> {
  let sources: Vec<String> = links.iter().map(|l| l.source_chunk_id.to_string()).collect();
  let targets: Vec<String> = links.iter().map(|l| l.target_chunk_id.to_string()).collect();
  let relations: Vec<String> = links.iter().map(|l| l.relation.clone()).collect();

  let batch = RecordBatch::try_new(
    links_schema(),
    vec![Arc::new(StringArray::from(sources)), Arc::new(StringArray::from(targets)), Arc::new(StringArray::from(relations))],
  )?;
  Ok(batch)
}

fn batch_to_link(batch: &RecordBatch, row: usize) -> Result<Link> {
  let get_str = |name: &str| -> Result<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .map(|a| a.value(row).to_string())
      .ok_or_else(|| StoreError::NotFound(format!("column {name}")))
  };

  Ok(Link {
    source_chunk_id: Uuid::parse_str(&get_str("source_chunk_id")?).map_err(|_| StoreError::InvalidInput("bad source_chunk_id".into()))?,
    target_chunk_id: Uuid::parse_str(&get_str("target_chunk_id")?).map_err(|_| StoreError::InvalidInput("bad target_chunk_id".into()))?,
    relation: get_str("relation")?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn insert_and_fetch_outgoing_links() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("t.lancedb"), 4).await.unwrap();

    let source = Uuid::new_v4();
    let target = Uuid::new_v4();
    store.insert_links(&[Link { source_chunk_id: source, target_chunk_id: target, relation: "imports".to_string() }]).await.unwrap();

    let links = store.get_links_from(source).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].target_chunk_id, target);
  }

  #[tokio::test]
  async fn delete_for_chunks_matches_source_or_target() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("t.lancedb"), 4).await.unwrap();

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    store.insert_links(&[
      Link { source_chunk_id: a, target_chunk_id: b, relation: "calls".to_string() },
      Link { source_chunk_id: c, target_chunk_id: a, relation: "imports".to_string() },
      Link { source_chunk_id: b, target_chunk_id: c, relation: "calls".to_string() },
    ]).await.unwrap();

    store.delete_links_for_chunks(&[a]).await.unwrap();

    assert!(store.get_links_from(a).await.unwrap().is_empty());
    let remaining = store.get_links_from(b).await.unwrap();
    assert_eq!(remaining.len(), 1);
  }
}
