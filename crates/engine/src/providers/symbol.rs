use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use context_store::Store;

use super::{Corpus, RankedChunk, SearchFilter, SearchProvider};
use crate::error::EngineError;

/// Splits an identifier on `.`/`_`/`-` and camelCase boundaries into
/// lowercase tokens, e.g. `getUserName` / `get_user_name` -> `["get",
/// "user", "name"]`.
fn tokenize_identifier(name: &str) -> Vec<String> {
  let mut tokens = Vec::new();
  for part in name.split(['.', '_', '-']) {
    if part.is_empty() {
      continue;
    }
    let mut current = String::new();
    for ch in part.chars() {
      if ch.is_uppercase() && !current.is_empty() {
        tokens.push(current.to_lowercase());
        current = String::new();
      }
      current.push(ch);
    }
    if !current.is_empty() {
      tokens.push(current.to_lowercase());
    }
  }
  tokens
}

pub struct SymbolProvider {
  store: Arc<Store>,
  enabled: bool,
  weight: f32,
}

impl SymbolProvider {
  pub fn new(store: Arc<Store>, enabled: bool, weight: f32) -> Self {
    Self { store, enabled, weight }
  }
}

#[async_trait]
impl SearchProvider for SymbolProvider {
  fn name(&self) -> &str {
    "symbol"
  }

  fn weight(&self) -> f32 {
    self.weight
  }

  fn enabled(&self) -> bool {
    self.enabled
  }

  async fn search(&self, query: &str, filter: &SearchFilter, k: usize) -> Result<Vec<RankedChunk>, EngineError> {
    let query_tokens: HashSet<String> = tokenize_identifier(query).into_iter().collect();
    if query_tokens.is_empty() {
      return Ok(Vec::new());
    }

    let corpus = Corpus::load(&self.store).await?;
    let allowed_chunks: HashSet<_> = corpus.filtered(filter).into_iter().map(|c| c.chunk_id).collect();
    let symbols = self.store.list_all_symbols().await?;

    let mut scored: Vec<RankedChunk> = Vec::new();
    for symbol in &symbols {
      if !allowed_chunks.contains(&symbol.chunk_id) {
        continue;
      }
      let tokens = tokenize_identifier(&symbol.name);
      if tokens.is_empty() {
        continue;
      }
      let exact = tokens.iter().filter(|t| query_tokens.contains(*t)).count();
      let prefix = tokens.iter().filter(|t| query_tokens.iter().any(|q| t.starts_with(q.as_str()) && !query_tokens.contains(*t))).count();
      if exact == 0 && prefix == 0 {
        continue;
      }
      let score = (exact as f32 * 2.0 + prefix as f32) / tokens.len() as f32;
      scored.push(RankedChunk { chunk_id: symbol.chunk_id, score });
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a.chunk_id.cmp(&b.chunk_id)));
    scored.truncate(k);
    Ok(scored)
  }
}
