use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
  fn name(&self) -> &str;
  fn model_id(&self) -> &str;
  fn dimensions(&self) -> usize;

  async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::EmbeddingError>;
  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, crate::EmbeddingError>;
  async fn is_available(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
  #[error("provider not available")]
  NotAvailable,
  #[error("provider error: {0}")]
  ProviderError(String),
  #[error("model load failed: {0}")]
  ModelLoad(String),
  #[error("request timed out")]
  Timeout,
}
