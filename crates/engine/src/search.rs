//! SearchPipeline: fan out to enabled providers, fuse with Reciprocal Rank
//! Fusion, diversify with Maximal Marginal Relevance, then trim to a token
//! budget.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use context_core::Chunk;
use context_store::Store;
use futures::future::join_all;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::EngineError;
use crate::providers::{SearchFilter, SearchProvider};

const K_RRF: f32 = 60.0;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
  pub chunk_id: Uuid,
  pub rel_path: String,
  pub text: String,
  pub start_line: u32,
  pub end_line: u32,
  pub score: f32,
  pub token_count: u32,
  /// Each enabled provider's raw RRF contribution (`weight / (k_rrf +
  /// rank)`) to this chunk's fused score, keyed by provider name.
  pub provider_contributions: HashMap<String, f32>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SearchMetadata {
  pub providers_used: Vec<String>,
  pub providers_timed_out: Vec<String>,
  pub candidates_considered: usize,
  pub total_hits: usize,
  pub tokens_used: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
  pub hits: Vec<SearchHit>,
  pub metadata: SearchMetadata,
}

pub struct SearchPipeline {
  store: Arc<Store>,
  providers: Vec<Arc<dyn SearchProvider>>,
  mmr_lambda: f32,
  min_score_threshold: f32,
  provider_timeout: Duration,
}

impl SearchPipeline {
  pub fn new(
    store: Arc<Store>,
    providers: Vec<Arc<dyn SearchProvider>>,
    mmr_lambda: f32,
    min_score_threshold: f32,
    provider_timeout: Duration,
  ) -> Self {
    Self { store, providers, mmr_lambda, min_score_threshold, provider_timeout }
  }

  pub async fn search(
    &self,
    query: &str,
    k: usize,
    max_tokens: u32,
    filter: &SearchFilter,
  ) -> Result<SearchResult, EngineError> {
    let k_prime = (k * 3).min(100);
    let enabled: Vec<_> = self.providers.iter().filter(|p| p.enabled()).collect();

    let mut metadata = SearchMetadata::default();
    let futures = enabled.iter().map(|provider| {
      let provider: &Arc<dyn SearchProvider> = *provider;
      let query = query.to_string();
      let filter = filter.clone();
      async move {
        match tokio::time::timeout(self.provider_timeout, provider.search(&query, &filter, k_prime)).await {
          Ok(Ok(ranked)) => Some((provider.name().to_string(), provider.weight(), ranked)),
          Ok(Err(err)) => {
            warn!(provider = provider.name(), %err, "provider search failed");
            None
          }
          Err(_) => {
            warn!(provider = provider.name(), "provider search timed out");
            None
          }
        }
      }
    });
    let results = join_all(futures).await;

    // Per-chunk, per-provider RRF contributions; `rrf_scores`'s flattened sum
    // is what ranking/MMR act on, but each provider's own share survives
    // alongside it so a hit can report where its score came from.
    let mut contributions: HashMap<Uuid, HashMap<String, f32>> = HashMap::new();
    let mut rrf_scores: HashMap<Uuid, f32> = HashMap::new();
    for outcome in results.into_iter() {
      match outcome {
        Some((name, weight, ranked)) => {
          metadata.providers_used.push(name.clone());
          for (idx, item) in ranked.iter().enumerate() {
            let rank = (idx + 1) as f32;
            let contribution = weight / (K_RRF + rank);
            *rrf_scores.entry(item.chunk_id).or_insert(0.0) += contribution;
            *contributions.entry(item.chunk_id).or_default().entry(name.clone()).or_insert(0.0) += contribution;
          }
        }
        None => {}
      }
    }
    for provider in &enabled {
      if !metadata.providers_used.contains(&provider.name().to_string()) {
        metadata.providers_timed_out.push(provider.name().to_string());
      }
    }

    let mut ranked: Vec<(Uuid, f32)> = rrf_scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    let pool_size = (k * 2).min(50);
    ranked.truncate(pool_size);
    metadata.candidates_considered = ranked.len();

    if ranked.is_empty() {
      return Ok(SearchResult { hits: Vec::new(), metadata });
    }

    let max_rrf = ranked.iter().map(|(_, s)| *s).fold(0.0f32, f32::max).max(f32::EPSILON);

    let mut candidates = Vec::with_capacity(ranked.len());
    for (chunk_id, rrf_score) in &ranked {
      if let Some((chunk, embedding)) = self.store.get_chunk_by_id(*chunk_id).await? {
        let chunk_contributions = contributions.remove(chunk_id).unwrap_or_default();
        candidates.push((chunk, embedding, rrf_score / max_rrf, chunk_contributions));
      }
    }

    let selected = self.select_with_mmr(candidates, k);
    let hits = self.apply_token_budget(selected, max_tokens).await?;
    metadata.total_hits = hits.len();
    metadata.tokens_used = hits.iter().map(|h| h.token_count).sum();

    for hit in &hits {
      if let Err(err) = self.store.record_usage(hit.chunk_id).await {
        warn!(chunk_id = %hit.chunk_id, %err, "failed to record chunk usage");
      }
    }

    Ok(SearchResult { hits, metadata })
  }

  /// Greedily picks the chunk maximizing `lambda * relevance - (1 - lambda)
  /// * max_similarity_to_selected`, stopping at `k` picks or once relevance
  /// drops below the configured floor.
  fn select_with_mmr(
    &self,
    candidates: Vec<(Chunk, Option<context_core::Embedding>, f32, HashMap<String, f32>)>,
    k: usize,
  ) -> Vec<(Chunk, f32, HashMap<String, f32>)> {
    let mut pool = candidates;
    let mut selected: Vec<(Chunk, Option<context_core::Embedding>, f32, HashMap<String, f32>)> = Vec::new();

    while selected.len() < k && !pool.is_empty() {
      let mut best_idx = None;
      let mut best_score = f32::MIN;

      for (idx, (_, embedding, relevance, _)) in pool.iter().enumerate() {
        if *relevance < self.min_score_threshold {
          continue;
        }
        let max_sim = selected
          .iter()
          .filter_map(|(_, sel_emb, _, _)| match (embedding, sel_emb) {
            (Some(a), Some(b)) => Some(cosine_similarity(&a.vector, &b.vector)),
            _ => None,
          })
          .fold(0.0f32, f32::max);

        let mmr = self.mmr_lambda * relevance - (1.0 - self.mmr_lambda) * max_sim;
        if mmr > best_score {
          best_score = mmr;
          best_idx = Some(idx);
        }
      }

      let Some(idx) = best_idx else { break };
      selected.push(pool.remove(idx));
    }

    selected.into_iter().map(|(chunk, _, relevance, contributions)| (chunk, relevance, contributions)).collect()
  }

  async fn apply_token_budget(
    &self,
    selected: Vec<(Chunk, f32, HashMap<String, f32>)>,
    max_tokens: u32,
  ) -> Result<Vec<SearchHit>, EngineError> {
    let mut hits = Vec::new();
    let mut used_tokens: u32 = 0;

    for (chunk, score, provider_contributions) in selected {
      if used_tokens + chunk.token_count > max_tokens {
        break;
      }
      used_tokens += chunk.token_count;
      let rel_path = self.store.get_file_by_id(chunk.file_id).await?.map(|f| f.rel_path).unwrap_or_default();
      hits.push(SearchHit {
        chunk_id: chunk.chunk_id,
        rel_path,
        text: chunk.text,
        start_line: chunk.start_line,
        end_line: chunk.end_line,
        score,
        token_count: chunk.token_count,
        provider_contributions,
      });
    }
    Ok(hits)
  }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  if a.len() != b.len() || a.is_empty() {
    return 0.0;
  }
  let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
  let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
  let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
  if norm_a == 0.0 || norm_b == 0.0 {
    return 0.0;
  }
  (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
