//! Bridges `notify`'s sync callback into the async indexer mailbox, debouncing
//! rapid edits and coalescing event sequences into a single `IndexJob` per
//! settled path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use context_core::Config;
use context_index::{Decision, PathPolicy};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::content_cache::ContentCache;
use crate::message::{IndexJob, IndexerHandle};

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
  #[error("failed to initialize watcher: {0}")]
  Init(#[source] notify::Error),
  #[error("failed to watch path: {0}")]
  Watch(#[source] notify::Error),
}

#[derive(Debug, Clone)]
enum ChangeKind {
  Created,
  Modified,
  Deleted,
  Renamed { from: PathBuf },
}

#[derive(Debug)]
struct PendingChange {
  kind: ChangeKind,
  last_event: Instant,
}

impl PendingChange {
  fn new(kind: ChangeKind) -> Self {
    Self { kind, last_event: Instant::now() }
  }

  fn update(&mut self, kind: ChangeKind) {
    self.last_event = Instant::now();
    match (&self.kind, &kind) {
      (ChangeKind::Created, ChangeKind::Modified) => trace!("coalescing create+modify -> create"),
      (ChangeKind::Deleted, ChangeKind::Created) => {
        self.kind = ChangeKind::Modified;
        trace!("coalescing delete+create -> modified");
      }
      (ChangeKind::Created, ChangeKind::Deleted) => {
        self.kind = ChangeKind::Deleted;
        trace!("coalescing create+delete -> delete");
      }
      (ChangeKind::Renamed { .. }, ChangeKind::Modified) => trace!("coalescing rename+modify -> rename"),
      _ => self.kind = kind,
    }
  }
}

pub struct WatcherTask {
  config: Config,
  root: PathBuf,
  indexer: IndexerHandle,
  cancel: CancellationToken,
  _watcher: RecommendedWatcher,
  event_rx: mpsc::Receiver<Result<Event, notify::Error>>,
  content_cache: ContentCache,
  debounce: Duration,
}

impl WatcherTask {
  pub fn new(config: Config, root: PathBuf, indexer: IndexerHandle, cancel: CancellationToken) -> Result<Self, WatcherError> {
    info!(root = %root.display(), "initializing file watcher");
    let (event_tx, event_rx) = mpsc::channel::<Result<Event, notify::Error>>(256);

    let mut watcher = notify::recommended_watcher(move |res| {
      let _ = event_tx.blocking_send(res);
    })
    .map_err(WatcherError::Init)?;
    watcher.watch(&root, RecursiveMode::Recursive).map_err(WatcherError::Watch)?;

    let debounce = Duration::from_millis(config.debounce_ms);
    let content_cache = ContentCache::new(1000, config.max_file_size_bytes as usize);

    Ok(Self { config, root, indexer, cancel, _watcher: watcher, event_rx, content_cache, debounce })
  }

  pub fn spawn(
    config: Config,
    root: PathBuf,
    indexer: IndexerHandle,
    cancel: CancellationToken,
  ) -> Result<tokio::task::JoinHandle<()>, WatcherError> {
    let task = Self::new(config, root, indexer, cancel)?;
    Ok(tokio::spawn(task.run()))
  }

  pub async fn run(mut self) {
    info!(root = %self.root.display(), "watcher started");
    let mut pending: HashMap<PathBuf, PendingChange> = HashMap::new();
    let mut debounce_interval = tokio::time::interval(self.debounce);

    loop {
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!("watcher shutting down (cancelled)");
          break;
        }

        event = self.event_rx.recv() => {
          match event {
            Some(Ok(event)) => self.process_event(&mut pending, event),
            Some(Err(err)) => warn!(%err, "watcher error"),
            None => {
              info!("watcher shutting down (channel closed)");
              break;
            }
          }
        }

        _ = debounce_interval.tick() => {
          self.flush_settled(&mut pending).await;
        }
      }
    }

    if !pending.is_empty() {
      debug!(pending = pending.len(), "flushing remaining pending events on shutdown");
      self.flush_all(&mut pending).await;
    }
    info!(root = %self.root.display(), "watcher stopped");
  }

  /// DELETED events bypass PathPolicy entirely: a file that no longer exists
  /// cannot be classified by extension/size/binary-ness, and skipping the
  /// check here is load-bearing, not an optimization.
  fn classify(&self, path: &Path) -> Decision {
    PathPolicy::new(&self.config).classify(path)
  }

  fn process_event(&mut self, pending: &mut HashMap<PathBuf, PendingChange>, event: Event) {
    for path in &event.paths {
      if path.is_dir() {
        continue;
      }

      let kind = match event.kind {
        EventKind::Create(_) => {
          if !self.classify(path).is_index() {
            continue;
          }
          ChangeKind::Created
        }
        EventKind::Modify(notify::event::ModifyKind::Name(rename_mode)) => {
          use notify::event::RenameMode;
          match rename_mode {
            RenameMode::Both => {
              if event.paths.len() >= 2 {
                let from = &event.paths[0];
                let to = &event.paths[1];
                if to.is_dir() {
                  continue;
                }
                if !self.classify(to).is_index() {
                  pending.insert(from.clone(), PendingChange::new(ChangeKind::Deleted));
                  continue;
                }
                pending.remove(from);
                if let Some(content) = self.content_cache.get(from) {
                  self.content_cache.remove(from);
                  self.content_cache.insert(to.clone(), content);
                }
                pending.insert(to.clone(), PendingChange::new(ChangeKind::Renamed { from: from.clone() }));
                return;
              }
              ChangeKind::Modified
            }
            RenameMode::From => {
              self.content_cache.remove(path);
              ChangeKind::Deleted
            }
            RenameMode::To => {
              if !self.classify(path).is_index() {
                continue;
              }
              ChangeKind::Created
            }
            RenameMode::Any | RenameMode::Other => {
              if !self.classify(path).is_index() {
                continue;
              }
              ChangeKind::Modified
            }
          }
        }
        EventKind::Modify(_) => {
          if !self.classify(path).is_index() {
            continue;
          }
          ChangeKind::Modified
        }
        EventKind::Remove(_) => {
          self.content_cache.remove(path);
          ChangeKind::Deleted
        }
        EventKind::Access(_) | EventKind::Any | EventKind::Other => continue,
      };

      if let Some(existing) = pending.get_mut(path) {
        existing.update(kind);
      } else {
        pending.insert(path.clone(), PendingChange::new(kind));
      }
    }
  }

  async fn flush_settled(&mut self, pending: &mut HashMap<PathBuf, PendingChange>) {
    let now = Instant::now();
    let debounce = self.debounce;
    let settled: Vec<PathBuf> =
      pending.iter().filter(|(_, change)| now.duration_since(change.last_event) >= debounce).map(|(p, _)| p.clone()).collect();
    if settled.is_empty() {
      return;
    }
    for path in settled {
      if let Some(change) = pending.remove(&path) {
        self.send_change(path, change).await;
      }
    }
  }

  async fn flush_all(&mut self, pending: &mut HashMap<PathBuf, PendingChange>) {
    let changes: Vec<(PathBuf, PendingChange)> = pending.drain().collect();
    for (path, change) in changes {
      self.send_change(path, change).await;
    }
  }

  fn rel_path(&self, path: &Path) -> String {
    path.strip_prefix(&self.root).unwrap_or(path).to_string_lossy().replace('\\', "/")
  }

  async fn send_change(&mut self, path: PathBuf, change: PendingChange) {
    let old_content = match change.kind {
      ChangeKind::Modified => self.content_cache.get(&path),
      _ => None,
    };

    if matches!(change.kind, ChangeKind::Created | ChangeKind::Modified) {
      if let Ok(content) = tokio::fs::read_to_string(&path).await {
        self.content_cache.insert(path.clone(), content);
      }
    }

    let job = match change.kind {
      ChangeKind::Created | ChangeKind::Modified => {
        IndexJob::File { rel_path: self.rel_path(&path), old_content }
      }
      ChangeKind::Deleted => IndexJob::Delete { rel_path: self.rel_path(&path) },
      ChangeKind::Renamed { from } => IndexJob::Rename { from: self.rel_path(&from), to: self.rel_path(&path) },
    };

    if let Err(err) = self.indexer.send(job).await {
      warn!(%err, "failed to send index job");
    }
  }
}
