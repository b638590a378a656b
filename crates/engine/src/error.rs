use context_core::error::ErrorKind;
use thiserror::Error;

/// Composition of every crate's own error type into the taxonomy callers see.
/// Mirrors the teacher's `ScanError`/`DbError` composition pattern, scaled up
/// to the full set of collaborators the engine owns.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("config error: {0}")]
  Config(#[from] context_core::ConfigError),
  #[error("filesystem error: {0}")]
  Filesystem(#[from] std::io::Error),
  #[error("store error: {0}")]
  Store(#[from] context_store::StoreError),
  #[error("embedding error: {0}")]
  Embedding(#[from] context_embedding::EmbeddingError),
  #[error("per-file indexing timed out after {0:?}")]
  Timeout(std::time::Duration),
  #[error("operation cancelled")]
  Cancelled,
}

impl EngineError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      EngineError::Config(_) => ErrorKind::Config,
      EngineError::Filesystem(_) => ErrorKind::Filesystem,
      EngineError::Store(_) => ErrorKind::Store,
      EngineError::Embedding(_) => ErrorKind::Embedding,
      EngineError::Timeout(_) => ErrorKind::Timeout,
      EngineError::Cancelled => ErrorKind::Cancelled,
    }
  }
}
