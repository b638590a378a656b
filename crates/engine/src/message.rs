use tokio::sync::mpsc;

/// A unit of indexing work handed to the indexer task's mailbox.
#[derive(Debug)]
pub enum IndexJob {
  /// (Re)index a single path. `old_content` carries the previous bytes when
  /// known, so the indexer can reuse them for incremental reparsing.
  File { rel_path: String, old_content: Option<String> },
  /// Remove a path and cascade-delete its artifacts.
  Delete { rel_path: String },
  /// A file moved without content changes; embeddings survive.
  Rename { from: String, to: String },
  /// Index many paths, reporting progress on an optional channel.
  Batch { rel_paths: Vec<String>, progress: Option<mpsc::Sender<IndexProgress>> },
  /// Stop accepting new work after draining the current job.
  Shutdown,
}

#[derive(Debug, Clone, Default)]
pub struct IndexProgress {
  pub processed: usize,
  pub total: usize,
  pub current_file: Option<String>,
  pub chunks_created: usize,
}

impl IndexProgress {
  pub fn new(processed: usize, total: usize) -> Self {
    Self { processed, total, current_file: None, chunks_created: 0 }
  }

  pub fn with_current_file(mut self, file: impl Into<String>) -> Self {
    self.current_file = Some(file.into());
    self
  }

  pub fn with_chunks_created(mut self, count: usize) -> Self {
    self.chunks_created = count;
    self
  }

  pub fn percent(&self) -> f32 {
    if self.total == 0 { 100.0 } else { (self.processed as f32 / self.total as f32) * 100.0 }
  }

  pub fn is_complete(&self) -> bool {
    self.total > 0 && self.processed >= self.total
  }
}

/// Handle used to enqueue work on the indexer's mailbox without blocking the
/// sender on indexing itself.
#[derive(Clone, Debug)]
pub struct IndexerHandle {
  pub tx: mpsc::Sender<IndexJob>,
}

impl IndexerHandle {
  pub fn new(tx: mpsc::Sender<IndexJob>) -> Self {
    Self { tx }
  }

  pub async fn send(&self, job: IndexJob) -> Result<(), SendError> {
    self.tx.send(job).await.map_err(|_| SendError::ActorGone)
  }

  pub async fn index_file(&self, rel_path: impl Into<String>, old_content: Option<String>) -> Result<(), SendError> {
    self.send(IndexJob::File { rel_path: rel_path.into(), old_content }).await
  }

  pub async fn delete_file(&self, rel_path: impl Into<String>) -> Result<(), SendError> {
    self.send(IndexJob::Delete { rel_path: rel_path.into() }).await
  }

  pub async fn rename_file(&self, from: impl Into<String>, to: impl Into<String>) -> Result<(), SendError> {
    self.send(IndexJob::Rename { from: from.into(), to: to.into() }).await
  }

  pub async fn index_batch(
    &self,
    rel_paths: Vec<String>,
    progress: Option<mpsc::Sender<IndexProgress>>,
  ) -> Result<(), SendError> {
    self.send(IndexJob::Batch { rel_paths, progress }).await
  }

  pub async fn shutdown(&self) -> Result<(), SendError> {
    self.send(IndexJob::Shutdown).await
  }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
  #[error("indexer has shut down")]
  ActorGone,
}

