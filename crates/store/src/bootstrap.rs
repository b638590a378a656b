use arrow_array::{Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array};
use context_core::{BootstrapProgress, BootstrapState};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

use crate::connection::Store;
use crate::error::{Result, StoreError};
use crate::schema::bootstrap_progress_schema;

impl Store {
  pub async fn upsert_bootstrap_progress(&self, progress: &BootstrapProgress) -> Result<()> {
    let table = self.bootstrap_progress_table().await?;
    table.delete(&format!("rel_path = '{}'", escape(&progress.rel_path))).await?;

    let batch = progress_to_batch(progress)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], bootstrap_progress_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn list_bootstrap_progress(&self, state: Option<BootstrapState>) -> Result<Vec<BootstrapProgress>> {
    let table = self.bootstrap_progress_table().await?;
    let query = match state {
      Some(s) => table.query().only_if(format!("state = '{}'", state_to_str(s))),
      None => table.query(),
    };
    let results: Vec<RecordBatch> = query.execute().await?.try_collect().await?;

    let mut out = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        out.push(batch_to_progress(&batch, i)?);
      }
    }
    Ok(out)
  }

  /// Unconditional reset for a full `rebuild`; `refresh` never calls this.
  pub async fn clear_bootstrap_progress(&self) -> Result<()> {
    let table = self.bootstrap_progress_table().await?;
    table.delete("true").await?;
    Ok(())
  }
}

fn escape(s: &str) -> String {
  s.replace('\'', "''")
}

fn state_to_str(state: BootstrapState) -> &'static str {
  match state {
    BootstrapState::Pending => "pending",
    BootstrapState::InProgress => "in_progress",
    BootstrapState::Done => "done",
    BootstrapState::Failed => "failed",
  }
}

fn str_to_state(s: &str) -> BootstrapState {
  match s {
    "in_progress" => BootstrapState::InProgress,
    "done" => BootstrapState::Done,
    "failed" => BootstrapState::Failed,
    _ => BootstrapState::Pending,
  }
}

fn progress_to_batch(progress: &BootstrapProgress) -> Result<RecordBatch> {
  let batch = RecordBatch::try_new(
    bootstrap_progress_schema(),
    vec![
      Arc::new(StringArray::from(vec![progress.rel_path.clone()])),
      Arc::new(Int64Array::from(vec![progress.enqueued_at_ms])),
      Arc::new(StringArray::from(vec![state_to_str(progress.state).to_string()])),
      Arc::new(UInt32Array::from(vec![progress.attempts])),
    ],
  )?;
  Ok(batch)
}

fn batch_to_progress(batch: &RecordBatch, row: usize) -> Result<BootstrapProgress> {
  let get_str = |name: &str| -> Result<String> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<StringArray>())
      .map(|a| a.value(row).to_string())
      .ok_or_else(|| StoreError::NotFound(format!("column {name}")))
  };
  let get_i64 = |name: &str| -> Result<i64> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
      .map(|a| a.value(row))
      .ok_or_else(|| StoreError::NotFound(format!("column {name}")))
  };
  let get_u32 = |name: &str| -> Result<u32> {
    batch
      .column_by_name(name)
      .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
      .map(|a| a.value(row))
      .ok_or_else(|| StoreError::NotFound(format!("column {name}")))
  };

  Ok(BootstrapProgress {
    rel_path: get_str("rel_path")?,
    enqueued_at_ms: get_i64("enqueued_at_ms")?,
    state: str_to_state(&get_str("state")?),
    attempts: get_u32("attempts")?,
  })
}
