// Resilient embedding provider wrapper with retries and exponential backoff.
//
// The local ONNX provider has no network to flake on, but it still shares
// the same failure surface as a remote one would: a transient resource
// exhaustion (model re-init under memory pressure, a busy thread pool) is
// worth retrying rather than failing the whole batch.

use crate::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
  pub backoff_multiplier: f64,
  pub add_jitter: bool,
  pub request_timeout: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 2,
      initial_backoff: Duration::from_millis(200),
      max_backoff: Duration::from_secs(5),
      backoff_multiplier: 2.0,
      add_jitter: true,
      request_timeout: Duration::from_secs(30),
    }
  }
}

impl RetryConfig {
  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
    let mut backoff = Duration::from_secs_f64(base.min(self.max_backoff.as_secs_f64()));

    if self.add_jitter {
      let jitter_factor = 1.0 + (rand_f64() * 0.25);
      backoff = Duration::from_secs_f64(backoff.as_secs_f64() * jitter_factor);
    }

    backoff.min(self.max_backoff)
  }
}

fn rand_f64() -> f64 {
  use std::time::{SystemTime, UNIX_EPOCH};
  let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().subsec_nanos();
  (nanos as f64 / u32::MAX as f64).fract()
}

pub fn is_retryable_error(error: &EmbeddingError) -> bool {
  matches!(error, EmbeddingError::ProviderError(_) | EmbeddingError::Timeout)
}

pub struct ResilientProvider<P: EmbeddingProvider> {
  inner: P,
  config: RetryConfig,
}

impl<P: EmbeddingProvider> ResilientProvider<P> {
  pub fn new(provider: P) -> Self {
    Self { inner: provider, config: RetryConfig::default() }
  }

  pub fn with_config(provider: P, config: RetryConfig) -> Self {
    Self { inner: provider, config }
  }

  async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let backoff = self.config.backoff_for_attempt(attempt - 1);
        debug!("retry attempt {} after {:?}", attempt, backoff);
        sleep(backoff).await;
      }

      match tokio::time::timeout(self.config.request_timeout, self.inner.embed(text)).await {
        Ok(Ok(result)) => return Ok(result),
        Ok(Err(e)) => {
          if is_retryable_error(&e) && attempt < self.config.max_retries {
            warn!("retryable error on attempt {}: {}", attempt + 1, e);
            last_error = Some(e);
            continue;
          }
          return Err(e);
        }
        Err(_) => {
          warn!("embed call timed out on attempt {}", attempt + 1);
          last_error = Some(EmbeddingError::Timeout);
          if attempt < self.config.max_retries {
            continue;
          }
        }
      }
    }

    Err(last_error.unwrap_or_else(|| EmbeddingError::ProviderError("max retries exceeded".to_string())))
  }
}

#[async_trait]
impl<P: EmbeddingProvider + Send + Sync> EmbeddingProvider for ResilientProvider<P> {
  fn name(&self) -> &str {
    self.inner.name()
  }

  fn model_id(&self) -> &str {
    self.inner.model_id()
  }

  fn dimensions(&self) -> usize {
    self.inner.dimensions()
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    self.embed_with_retry(text).await
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut results = Vec::with_capacity(texts.len());
    for text in texts {
      results.push(self.embed_with_retry(text).await?);
    }
    Ok(results)
  }

  async fn is_available(&self) -> bool {
    self.inner.is_available().await
  }
}

pub fn wrap_resilient<P: EmbeddingProvider>(provider: P) -> ResilientProvider<P> {
  ResilientProvider::new(provider)
}

pub fn wrap_resilient_arc<P>(provider: P) -> Arc<dyn EmbeddingProvider + Send + Sync>
where
  P: EmbeddingProvider + Send + Sync + 'static,
{
  Arc::new(ResilientProvider::new(provider))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_doubles_until_cap() {
    let config = RetryConfig {
      initial_backoff: Duration::from_secs(1),
      backoff_multiplier: 2.0,
      max_backoff: Duration::from_secs(4),
      add_jitter: false,
      ..Default::default()
    };
    assert_eq!(config.backoff_for_attempt(0), Duration::from_secs(1));
    assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(2));
    assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(4));
  }

  #[test]
  fn provider_error_is_retryable() {
    assert!(is_retryable_error(&EmbeddingError::ProviderError("busy".to_string())));
    assert!(is_retryable_error(&EmbeddingError::Timeout));
    assert!(!is_retryable_error(&EmbeddingError::NotAvailable));
  }
}
