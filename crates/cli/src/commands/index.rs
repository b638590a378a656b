use std::sync::Arc;

use anyhow::Result;
use context_engine::Engine;

/// Runs a refresh: enumerates changes since the last index and indexes them.
pub async fn cmd_index(engine: Arc<Engine>) -> Result<()> {
  let snapshot = engine.refresh(None).await?;
  println!(
    "indexed {} files ({} failed, {} in progress)",
    snapshot.done, snapshot.failed, snapshot.in_progress
  );
  Ok(())
}
