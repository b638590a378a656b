use arrow_array::{Array, RecordBatch, RecordBatchIterator, StringArray};
use context_core::{Symbol, SymbolKind};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;
use uuid::Uuid;

use crate::connection::Store;
use crate::error::{Result, StoreError};
use crate::schema::symbols_schema;

impl Store {
  pub async fn insert_symbols(&self, symbols: &[Symbol]) -> Result<()> {
    if symbols.is_empty() {
      return Ok(());
    }
    let table = self.symbols_table().await?;
    let batch = symbols_to_batch(symbols)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], symbols_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn get_symbols_for_chunks(&self, chunk_ids: &[Uuid]) -> Result<Vec<Symbol>> {
    if chunk_ids.is_empty() {
      return Ok(Vec::new());
    }
    let table = self.symbols_table().await?;
    let filter = in_clause("chunk_id", chunk_ids);
    let results: Vec<RecordBatch> = table.query().only_if(filter).execute().await?.try_collect().await?;

    let mut out = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        out.push(batch_to_symbol(&batch, i)?);
      }
    }
    Ok(out)
  }

  /// All symbols across every file, for `SymbolProvider`'s corpus-wide scan.
  pub async fn list_all_symbols(&self) -> Result<Vec<Symbol>> {
    let table = self.symbols_table().await?;
    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;
    let mut out = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        out.push(batch_to_symbol(&batch, i)?);
      }
    }
    Ok(out)
  }

  /// Delete all symbols referencing any of `chunk_ids`. Called before the
  /// owning chunk rows are removed, per the store's mandatory cascade order.
  pub async fn delete_symbols_for_chunks(&self, chunk_ids: &[Uuid]) -> Result<()> {
    if chunk_ids.is_empty() {
      return Ok(());
    }
    let table = self.symbols_table().await?;
    table.delete(&in_clause("chunk_id", chunk_ids)).await?;
    Ok(())
  }
}

fn in_clause(column: &str, ids: &[Uuid]) -> String {
  let list = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(", ");
  format!("{column} IN ({list})")
}

fn kind_to_str(kind: SymbolKind) -> &'static str {
  match kind {
    SymbolKind::Class => "class",
    SymbolKind::Function => "function",
    SymbolKind::Method => "method",
    SymbolKind::Variable => "variable",
    SymbolKind::Heading => "heading",
  }
}

fn str_to_kind(s: &str) -> SymbolKind {
  match s {
    "class" => SymbolKind::Class,
    "method" => SymbolKind::Method,
    "variable" => SymbolKind::Variable,
    "heading" => SymbolKind::Heading,
    _ => SymbolKind::Function,
  }
}

fn symbols_to_batch(symbols: &[Symbol]) -> Result<RecordBatch> {
  let ids: Vec<String> = symbols.iter().map(|s| s.symbol_id.to_string()).collect();
  let chunk_ids: Vec<String> = symbols.iter().map(|s| s.chunk_id.to_string()).collect();
  let names: Vec<String> = symbols.iter().map(|s| s.name.clone()).collect();
  let kinds: Vec<String> = symbols.iter().map(|s| kind_to_str(s.kind).to_string()).collect();
  let qualified: Vec<Option<String>> = symbols.iter().map(|s| s.qualified_name.clone()).collect();

  let batch = RecordBatch::try_new(
    symbols_schema(),
    vec![
      Arc::new(StringArray::from(ids)),
      Arc::new(StringArray::from(chunk_ids)),
      Arc::new(StringArray::from(names)),
      Arc::new(StringArray::from(kinds)),
      Arc::new(StringArray::from(qualified)),
    ],
  )?;
  Ok(batch)
}

fn batch_to_symbol(batch: &RecordBatch, row: usize) -> Result<Symbol> {
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

  Ok(Symbol {
    symbol_id: Uuid::parse_str(&get_str("symbol_id")?).map_err(|_| StoreError::InvalidInput("bad symbol_id".into()))?,
    chunk_id: Uuid::parse_str(&get_str("chunk_id")?).map_err(|_| StoreError::InvalidInput("bad chunk_id".into()))?,
    name: get_str("name")?,
    kind: str_to_kind(&get_str("kind")?),
    qualified_name: get_str_opt("qualified_name"),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn insert_and_fetch_by_chunk_ids() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("t.lancedb"), 4).await.unwrap();

    let chunk_id = Uuid::new_v4();
    let symbol = Symbol {
      symbol_id: Uuid::new_v4(),
      chunk_id,
      name: "foo".to_string(),
      kind: SymbolKind::Function,
      qualified_name: Some("module::foo".to_string()),
    };
    store.insert_symbols(&[symbol.clone()]).await.unwrap();

    let fetched = store.get_symbols_for_chunks(&[chunk_id]).await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].name, "foo");
  }

  #[tokio::test]
  async fn delete_for_chunks_removes_only_matching_rows() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("t.lancedb"), 4).await.unwrap();

    let keep_chunk = Uuid::new_v4();
    let drop_chunk = Uuid::new_v4();
    let kept = Symbol { symbol_id: Uuid::new_v4(), chunk_id: keep_chunk, name: "keep".to_string(), kind: SymbolKind::Variable, qualified_name: None };
    let dropped = Symbol { symbol_id: Uuid::new_v4(), chunk_id: drop_chunk, name: "drop".to_string(), kind: SymbolKind::Variable, qualified_name: None };
    store.insert_symbols(&[kept, dropped]).await.unwrap();

    store.delete_symbols_for_chunks(&[drop_chunk]).await.unwrap();

    assert_eq!(store.get_symbols_for_chunks(&[keep_chunk]).await.unwrap().len(), 1);
    assert!(store.get_symbols_for_chunks(&[drop_chunk]).await.unwrap().is_empty());
  }
}
