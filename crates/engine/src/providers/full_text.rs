use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use context_store::Store;

use super::{Corpus, RankedChunk, SearchFilter, SearchProvider};
use crate::error::EngineError;

const K1: f32 = 1.2;
const B: f32 = 0.75;

fn tokenize(text: &str) -> Vec<String> {
  text.split(|c: char| !c.is_alphanumeric()).filter(|s| !s.is_empty()).map(|s| s.to_lowercase()).collect()
}

fn term_frequencies(tokens: &[String]) -> HashMap<&str, u32> {
  let mut tf = HashMap::new();
  for token in tokens {
    *tf.entry(token.as_str()).or_insert(0) += 1;
  }
  tf
}

/// Classic Okapi BM25 over chunk text. The inverted index is rebuilt per
/// query rather than maintained incrementally; acceptable at the corpus
/// sizes a single-project Context Engine indexes.
pub struct FullTextProvider {
  store: Arc<Store>,
  enabled: bool,
  weight: f32,
}

impl FullTextProvider {
  pub fn new(store: Arc<Store>, enabled: bool, weight: f32) -> Self {
    Self { store, enabled, weight }
  }
}

#[async_trait]
impl SearchProvider for FullTextProvider {
  fn name(&self) -> &str {
    "full_text"
  }

  fn weight(&self) -> f32 {
    self.weight
  }

  fn enabled(&self) -> bool {
    self.enabled
  }

  async fn search(&self, query: &str, filter: &SearchFilter, k: usize) -> Result<Vec<RankedChunk>, EngineError> {
    let query_terms = tokenize(query);
    if query_terms.is_empty() {
      return Ok(Vec::new());
    }

    let corpus = Corpus::load(&self.store).await?;
    let documents: Vec<(uuid::Uuid, Vec<String>)> =
      corpus.filtered(filter).into_iter().map(|c| (c.chunk_id, tokenize(&c.text))).collect();
    if documents.is_empty() {
      return Ok(Vec::new());
    }

    let n = documents.len() as f32;
    let avg_len = documents.iter().map(|(_, toks)| toks.len()).sum::<usize>() as f32 / n;

    let mut doc_freq: HashMap<&str, u32> = HashMap::new();
    for (_, tokens) in &documents {
      let unique: std::collections::HashSet<&str> = tokens.iter().map(|t| t.as_str()).collect();
      for term in unique {
        *doc_freq.entry(term).or_insert(0) += 1;
      }
    }
    let idf = |term: &str| -> f32 {
      let n_term = *doc_freq.get(term).unwrap_or(&0) as f32;
      ((n - n_term + 0.5) / (n_term + 0.5) + 1.0).ln()
    };

    let mut scored = Vec::new();
    for (chunk_id, tokens) in &documents {
      let tf = term_frequencies(tokens);
      let doc_len = tokens.len() as f32;
      let mut score = 0.0f32;
      for term in &query_terms {
        let Some(&freq) = tf.get(term.as_str()) else { continue };
        let freq = freq as f32;
        score += idf(term) * (freq * (K1 + 1.0)) / (freq + K1 * (1.0 - B + B * doc_len / avg_len));
      }
      if score > 0.0 {
        scored.push(RankedChunk { chunk_id: *chunk_id, score });
      }
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a.chunk_id.cmp(&b.chunk_id)));
    scored.truncate(k);
    Ok(scored)
  }
}
