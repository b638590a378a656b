use std::sync::Arc;

use anyhow::Result;
use context_engine::Engine;
use tracing::info;

/// Watches the configured roots until interrupted with Ctrl-C.
pub async fn cmd_watch(engine: Arc<Engine>) -> Result<()> {
  engine.start_watch().await?;
  info!("watching {:?}, press ctrl-c to stop", engine.config().watch_roots);
  tokio::signal::ctrl_c().await?;
  engine.stop_watch().await;
  Ok(())
}
