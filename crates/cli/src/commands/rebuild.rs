use std::sync::Arc;

use anyhow::Result;
use context_engine::Engine;

/// Clears stored progress and re-indexes every file under the watch roots.
/// Destructive enough that the caller must pass `--yes` to actually run it.
pub async fn cmd_rebuild(engine: Arc<Engine>, confirm: bool) -> Result<()> {
  if !confirm {
    anyhow::bail!("rebuild clears all indexed state; pass --yes to confirm");
  }
  let snapshot = engine.rebuild(true).await?;
  println!(
    "rebuilt {} files ({} failed, {} in progress)",
    snapshot.done, snapshot.failed, snapshot.in_progress
  );
  Ok(())
}
