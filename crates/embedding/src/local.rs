//! Local ONNX embedding provider backed by `fastembed`.
//!
//! Model weights are downloaded once to the fastembed cache directory and
//! run entirely in-process; there is no network call on the hot path.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::{EmbeddingError, EmbeddingProvider};

fn resolve_model(tag: &str) -> EmbeddingModel {
  match tag {
    "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
    "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
    "bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
    "all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
    _ => EmbeddingModel::BGESmallENV15,
  }
}

pub struct LocalEmbeddingProvider {
  model: Arc<TextEmbedding>,
  model_id: String,
  dim: usize,
  normalize: bool,
  batch_size: usize,
}

impl LocalEmbeddingProvider {
  pub fn new(model_tag: &str, dim: usize, normalize: bool, batch_size: usize) -> Result<Self, EmbeddingError> {
    let embedding_model = resolve_model(model_tag);
    let options = InitOptions::new(embedding_model).with_show_download_progress(false);
    let model = TextEmbedding::try_new(options).map_err(|e| EmbeddingError::ModelLoad(e.to_string()))?;
    Ok(LocalEmbeddingProvider {
      model: Arc::new(model),
      model_id: model_tag.to_string(),
      dim,
      normalize,
      batch_size,
    })
  }

  fn normalize_vector(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
      for v in vector.iter_mut() {
        *v /= norm;
      }
    }
  }

  async fn embed_owned(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let model = self.model.clone();
    let batch_size = self.batch_size;
    let normalize = self.normalize;
    tokio::task::spawn_blocking(move || {
      let mut vectors = model
        .embed(texts, Some(batch_size))
        .map_err(|e| EmbeddingError::ProviderError(e.to_string()))?;
      if normalize {
        for v in vectors.iter_mut() {
          Self::normalize_vector(v);
        }
      }
      Ok(vectors)
    })
    .await
    .map_err(|e| EmbeddingError::ProviderError(e.to_string()))?
  }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
  fn name(&self) -> &str {
    "local"
  }

  fn model_id(&self) -> &str {
    &self.model_id
  }

  fn dimensions(&self) -> usize {
    self.dim
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let mut vectors = self.embed_owned(vec![text.to_string()]).await?;
    vectors.pop().ok_or_else(|| EmbeddingError::ProviderError("empty embed result".to_string()))
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let owned = texts.iter().map(|t| t.to_string()).collect();
    self.embed_owned(owned).await
  }

  async fn is_available(&self) -> bool {
    true
  }
}
