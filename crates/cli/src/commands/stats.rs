use std::sync::Arc;

use anyhow::Result;
use context_engine::Engine;

pub async fn cmd_stats(engine: Arc<Engine>, json: bool) -> Result<()> {
  let stats = engine.stats().await?;
  if json {
    println!("{}", serde_json::to_string_pretty(&stats)?);
    return Ok(());
  }
  println!("files:      {}", stats.files);
  println!("chunks:     {}", stats.chunks);
  println!("embeddings: {}", stats.embeddings);
  if !stats.language_distribution.is_empty() {
    println!("languages:");
    for (lang, count) in &stats.language_distribution {
      println!("  {lang:<16} {count}");
    }
  }
  if !stats.provider_status.is_empty() {
    println!("providers:");
    for (name, status) in &stats.provider_status {
      let state = if status.enabled { "enabled" } else { "disabled" };
      println!("  {name:<10} {state:<9} weight={:.2}", status.weight);
    }
  }
  Ok(())
}
