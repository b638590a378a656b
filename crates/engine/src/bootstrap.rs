//! Enumerates indexable paths under the watch roots and drives them through
//! the [`Indexer`] with a bounded worker pool, tracking resumable progress in
//! `bootstrap_progress`.
//!
//! `rebuild` clears that table before enumerating (a stale single-file
//! PENDING row must never masquerade as "the only remaining work" after a
//! full rebuild is requested); `refresh` instead runs the lighter
//! [`ChangeDetector`] diff and only enqueues the delta, leaving any
//! in-flight rows from a concurrent bootstrap untouched.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use context_core::{BootstrapProgress, BootstrapState, Config};
use context_index::{ChangeDetector, Decision, PathPolicy};
use context_store::Store;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::EngineError;
use crate::indexer::Indexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
  /// Clear progress, enumerate every indexable path, index all of them.
  Full,
  /// Enumerate only what the change detector reports as deleted.
  DeletedOnly,
  /// Enumerate what the change detector reports as deleted or newly created.
  DeletedAndNew,
}

#[derive(Debug, Default, Clone)]
pub struct BootstrapProgressSnapshot {
  pub total: usize,
  pub done: usize,
  pub in_progress: usize,
  pub failed: usize,
}

/// Shared, lock-free progress counters a caller can poll while a bootstrap
/// run is underway.
#[derive(Default)]
pub struct ScanState {
  total: AtomicUsize,
  done: AtomicUsize,
  in_progress: AtomicUsize,
  failed: AtomicUsize,
}

impl ScanState {
  pub fn snapshot(&self) -> BootstrapProgressSnapshot {
    BootstrapProgressSnapshot {
      total: self.total.load(Ordering::Relaxed),
      done: self.done.load(Ordering::Relaxed),
      in_progress: self.in_progress.load(Ordering::Relaxed),
      failed: self.failed.load(Ordering::Relaxed),
    }
  }
}

pub struct Bootstrap {
  config: Config,
  store: Arc<Store>,
  indexer: Arc<Indexer>,
  parallel_workers: usize,
}

impl Bootstrap {
  pub fn new(config: Config, store: Arc<Store>, indexer: Arc<Indexer>) -> Self {
    let parallel_workers = config.worker_count.max(1);
    Self { config, store, indexer, parallel_workers }
  }

  /// Full rebuild: clear `bootstrap_progress`, enumerate every INDEX-decision
  /// path via [`PathPolicy`], insert them as PENDING (or resume any existing
  /// PENDING rows the enumeration also touches), then drain the queue.
  pub async fn rebuild(&self, state: Arc<ScanState>) -> Result<BootstrapProgressSnapshot, EngineError> {
    info!("rebuild: clearing bootstrap_progress before enumeration");
    self.store.clear_bootstrap_progress().await?;
    let candidates = self.enumerate_candidates();
    self.run(candidates, state).await
  }

  /// Incremental refresh: diff the filesystem against the store and enqueue
  /// only created/modified/deleted paths. Existing in-flight progress rows
  /// from a concurrent bootstrap are left alone.
  pub async fn refresh(&self, state: Arc<ScanState>) -> Result<BootstrapProgressSnapshot, EngineError> {
    let known = self.store.list_files(false).await?;
    let detector = ChangeDetector::new(&self.config);
    let diff = detector.diff(&known);
    info!(created = diff.created.len(), modified = diff.modified.len(), deleted = diff.deleted.len(), "refresh diff computed");

    let mut to_index = Vec::new();
    let mut to_delete = Vec::new();
    for change in diff.created.iter().chain(diff.modified.iter()) {
      to_index.push(change.rel_path().to_string());
    }
    for change in &diff.deleted {
      to_delete.push(change.rel_path().to_string());
    }

    for rel_path in &to_delete {
      if let Err(err) = self.indexer.delete_path(rel_path).await {
        warn!(rel_path, %err, "failed to process deletion during refresh");
      }
    }

    self.run(to_index, state).await
  }

  /// Resume a previously interrupted bootstrap: any row left IN_PROGRESS is
  /// reset to PENDING (the worker that owned it is gone), then the pool
  /// drains everything still PENDING.
  pub async fn resume(&self, state: Arc<ScanState>) -> Result<BootstrapProgressSnapshot, EngineError> {
    let rows = self.store.list_bootstrap_progress(None).await?;
    let mut pending = Vec::new();
    for mut row in rows {
      if row.state == BootstrapState::InProgress {
        row.state = BootstrapState::Pending;
        self.store.upsert_bootstrap_progress(&row).await?;
      }
      if matches!(row.state, BootstrapState::Pending | BootstrapState::InProgress) {
        pending.push(row.rel_path);
      }
    }
    self.run(pending, state).await
  }

  fn enumerate_candidates(&self) -> Vec<String> {
    let policy = PathPolicy::new(&self.config);
    let mut out = Vec::new();
    for root in &self.config.watch_roots {
      let root_path = Path::new(root);
      for entry in WalkDir::new(root_path).follow_links(self.config.follow_symlinks) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
          continue;
        }
        if policy.classify(entry.path()) != Decision::Index {
          continue;
        }
        let rel = entry.path().strip_prefix(root_path).unwrap_or(entry.path()).to_string_lossy().replace('\\', "/");
        out.push(rel);
      }
    }
    out
  }

  async fn run(&self, rel_paths: Vec<String>, state: Arc<ScanState>) -> Result<BootstrapProgressSnapshot, EngineError> {
    state.total.store(rel_paths.len(), Ordering::Relaxed);
    let semaphore = Arc::new(Semaphore::new(self.parallel_workers));
    let mut handles = Vec::with_capacity(rel_paths.len());

    for rel_path in rel_paths {
      let progress = BootstrapProgress { state: BootstrapState::Pending, ..BootstrapProgress::new(rel_path.clone()) };
      self.store.upsert_bootstrap_progress(&progress).await?;

      let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
      let indexer = self.indexer.clone();
      let store = self.store.clone();
      let state = state.clone();
      state.in_progress.fetch_add(1, Ordering::Relaxed);

      handles.push(tokio::spawn(async move {
        let _permit = permit;
        let mut row = BootstrapProgress::new(rel_path.clone());
        row.state = BootstrapState::InProgress;
        let _ = store.upsert_bootstrap_progress(&row).await;

        let outcome = indexer.index_path(&rel_path).await;
        state.in_progress.fetch_sub(1, Ordering::Relaxed);

        match outcome {
          Ok(_) => {
            row.state = BootstrapState::Done;
            state.done.fetch_add(1, Ordering::Relaxed);
          }
          Err(err) => {
            warn!(rel_path, %err, "bootstrap indexing failed");
            row.attempts += 1;
            row.state = BootstrapState::Failed;
            state.failed.fetch_add(1, Ordering::Relaxed);
          }
        }
        let _ = store.upsert_bootstrap_progress(&row).await;
      }));
    }

    for handle in handles {
      let _ = handle.await;
    }

    debug!(workers = self.parallel_workers, "bootstrap run complete");
    Ok(state.snapshot())
  }
}
