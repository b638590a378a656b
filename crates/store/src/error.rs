use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("lancedb error: {0}")]
  Lance(#[from] lancedb::Error),
  #[error("arrow error: {0}")]
  Arrow(#[from] arrow_schema::ArrowError),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("not found: {0}")]
  NotFound(String),
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("invalid input: {0}")]
  InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
