//! Composition root: wires the Indexer, Watcher, Bootstrap and
//! SearchPipeline over a shared `Store` and `EmbeddingProvider`, and exposes
//! the engine's external interface (`query`, `stats`, `refresh`, `rebuild`,
//! `job_status`).

pub mod bootstrap;
pub mod content_cache;
pub mod error;
pub mod indexer;
pub mod message;
pub mod providers;
pub mod search;
pub mod watcher;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use context_core::{Config, StoreStats};
use context_embedding::{EmbeddingProvider, LocalEmbeddingProvider};
use context_store::Store;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

pub use crate::bootstrap::{Bootstrap, BootstrapProgressSnapshot, ScanState};
pub use crate::error::EngineError;
pub use crate::indexer::{IndexOutcome, Indexer};
pub use crate::message::{IndexJob, IndexProgress, IndexerHandle};
pub use crate::providers::{FullTextProvider, SearchFilter, SearchProvider, SemanticProvider, SymbolProvider};
pub use crate::search::{SearchHit, SearchMetadata, SearchPipeline, SearchResult};
pub use crate::watcher::WatcherTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
  Running,
  Done,
  Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
  pub state: JobState,
  pub progress: BootstrapProgressSnapshot,
  pub logs: Vec<String>,
}

/// The Context Engine: a single watch-root set backed by one `Store` and one
/// local embedder. Construct once via [`Engine::open`]; everything else
/// (indexing, watching, bootstrap, search) is a method on the resulting
/// handle.
pub struct Engine {
  config: Config,
  store: Arc<Store>,
  embedder: Arc<dyn EmbeddingProvider>,
  indexer: Arc<Indexer>,
  search_pipeline: SearchPipeline,
  watch_cancel: RwLock<Option<CancellationToken>>,
  jobs: DashMap<Uuid, JobStatus>,
  next_job_id: AtomicU64,
}

impl Engine {
  pub async fn open(config: Config) -> Result<Self, EngineError> {
    config.validate().map_err(EngineError::Config)?;

    let store = Arc::new(Store::open(&config.storage.db_path, config.embedding.dim as usize).await?);
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbeddingProvider::new(
      &config.embedding.model_tag,
      config.embedding.dim as usize,
      config.embedding.normalize,
      config.embedding.batch_size,
    )?);

    let indexer = Arc::new(Indexer::new(config.clone(), store.clone(), embedder.clone()));

    // Reset any bootstrap_progress rows a prior process left IN_PROGRESS
    // (its worker is gone) and drain whatever is still PENDING, so an
    // interrupted bootstrap actually resumes on restart.
    let resume_bootstrap = Bootstrap::new(config.clone(), store.clone(), indexer.clone());
    let resumed = resume_bootstrap.resume(Arc::new(ScanState::default())).await?;
    if resumed.total > 0 {
      info!(total = resumed.total, done = resumed.done, failed = resumed.failed, "resumed bootstrap progress from previous run");
    }

    let providers: Vec<Arc<dyn SearchProvider>> = vec![
      Arc::new(SemanticProvider::new(
        store.clone(),
        embedder.clone(),
        config.providers.semantic.enabled,
        config.providers.semantic.weight,
      )),
      Arc::new(SymbolProvider::new(store.clone(), config.providers.symbol.enabled, config.providers.symbol.weight)),
      Arc::new(FullTextProvider::new(store.clone(), config.providers.full_text.enabled, config.providers.full_text.weight)),
    ];
    let search_pipeline = SearchPipeline::new(
      store.clone(),
      providers,
      config.query.mmr_lambda,
      config.query.min_score_threshold,
      Duration::from_secs(5),
    );

    Ok(Self {
      config,
      store,
      embedder,
      indexer,
      search_pipeline,
      watch_cancel: RwLock::new(None),
      jobs: DashMap::new(),
      next_job_id: AtomicU64::new(1),
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn store(&self) -> &Arc<Store> {
    &self.store
  }

  pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
    &self.embedder
  }

  pub async fn query(
    &self,
    query: &str,
    k: Option<usize>,
    max_tokens: Option<u32>,
    filter: Option<SearchFilter>,
  ) -> Result<SearchResult, EngineError> {
    let k = k.unwrap_or(self.config.query.default_k);
    let max_tokens = max_tokens.unwrap_or(self.config.budget.default_max_tokens);
    let budget = max_tokens.saturating_sub(self.config.budget.reserve_for_prompt);
    let filter = filter.unwrap_or_default();
    self.search_pipeline.search(query, k, budget, &filter).await
  }

  pub async fn stats(&self) -> Result<StoreStats, EngineError> {
    let mut stats = self.store.stats().await?;
    let providers = &self.config.providers;
    stats.provider_status.insert(
      "semantic".to_string(),
      context_core::ProviderStatus { enabled: providers.semantic.enabled, weight: providers.semantic.weight },
    );
    stats.provider_status.insert(
      "symbol".to_string(),
      context_core::ProviderStatus { enabled: providers.symbol.enabled, weight: providers.symbol.weight },
    );
    stats.provider_status.insert(
      "full_text".to_string(),
      context_core::ProviderStatus { enabled: providers.full_text.enabled, weight: providers.full_text.weight },
    );
    Ok(stats)
  }

  /// Start watching the first configured root in the background. Returns a
  /// token the caller can cancel via [`Engine::stop_watch`]; calling this
  /// twice without stopping replaces the previous watch.
  pub async fn start_watch(&self) -> Result<(), EngineError> {
    let Some(root) = self.config.watch_roots.first().cloned() else {
      return Ok(());
    };
    let cancel = CancellationToken::new();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<IndexJob>(256);
    let handle = IndexerHandle::new(tx);
    let indexer = self.indexer.clone();

    tokio::spawn(async move {
      while let Some(job) = rx.recv().await {
        match job {
          IndexJob::File { rel_path, .. } => {
            let _ = indexer.index_path(&rel_path).await;
          }
          IndexJob::Delete { rel_path } => {
            let _ = indexer.delete_path(&rel_path).await;
          }
          IndexJob::Rename { from, to } => {
            let _ = indexer.rename_path(&from, &to).await;
          }
          IndexJob::Batch { rel_paths, progress } => {
            let total = rel_paths.len();
            for (i, rel_path) in rel_paths.iter().enumerate() {
              let _ = indexer.index_path(rel_path).await;
              if let Some(tx) = &progress {
                let _ = tx.send(IndexProgress::new(i + 1, total).with_current_file(rel_path.clone())).await;
              }
            }
          }
          IndexJob::Shutdown => break,
        }
      }
    });

    WatcherTask::spawn(self.config.clone(), PathBuf::from(&root), handle, cancel.clone())
      .map_err(|err| EngineError::Filesystem(std::io::Error::other(err.to_string())))?;
    *self.watch_cancel.write().await = Some(cancel);
    Ok(())
  }

  pub async fn stop_watch(&self) {
    if let Some(cancel) = self.watch_cancel.write().await.take() {
      cancel.cancel();
    }
  }

  /// Runs synchronously and returns the final snapshot. `async: true`-style
  /// background tracking is provided by [`Engine::refresh_async`].
  pub async fn refresh(&self, _paths: Option<Vec<String>>) -> Result<BootstrapProgressSnapshot, EngineError> {
    let bootstrap = Bootstrap::new(self.config.clone(), self.store.clone(), self.indexer.clone());
    bootstrap.refresh(Arc::new(ScanState::default())).await
  }

  pub async fn rebuild(&self, confirm: bool) -> Result<BootstrapProgressSnapshot, EngineError> {
    if !confirm {
      return Err(EngineError::Cancelled);
    }
    let bootstrap = Bootstrap::new(self.config.clone(), self.store.clone(), self.indexer.clone());
    bootstrap.rebuild(Arc::new(ScanState::default())).await
  }

  /// Same as `rebuild`, but returns immediately with a job id that
  /// [`Engine::job_status`] can poll.
  pub fn rebuild_async(self: &Arc<Self>, confirm: bool) -> Uuid {
    self.spawn_job(confirm, true)
  }

  pub fn refresh_async(self: &Arc<Self>) -> Uuid {
    self.spawn_job(true, false)
  }

  fn spawn_job(self: &Arc<Self>, confirm: bool, is_rebuild: bool) -> Uuid {
    let job_id = Uuid::new_v4();
    let state = Arc::new(ScanState::default());
    self.jobs.insert(
      job_id,
      JobStatus { state: JobState::Running, progress: state.snapshot(), logs: Vec::new() },
    );

    let engine = self.clone();
    tokio::spawn(async move {
      let bootstrap = Bootstrap::new(engine.config.clone(), engine.store.clone(), engine.indexer.clone());
      let outcome = if is_rebuild && confirm {
        bootstrap.rebuild(state.clone()).await
      } else {
        bootstrap.refresh(state.clone()).await
      };

      let (job_state, logs) = match outcome {
        Ok(_) => (JobState::Done, Vec::new()),
        Err(err) => (JobState::Failed, vec![err.to_string()]),
      };
      engine.jobs.insert(job_id, JobStatus { state: job_state, progress: state.snapshot(), logs });
    });

    job_id
  }

  pub fn job_status(&self, job_id: Uuid) -> Option<JobStatus> {
    self.jobs.get(&job_id).map(|entry| entry.clone())
  }
}

impl std::fmt::Debug for Engine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Engine").field("watch_roots", &self.config.watch_roots).finish()
  }
}

