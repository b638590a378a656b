use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Validated engine configuration. The core never parses TOML or any other
/// file format itself — callers (the `context-cli` binary, or any other
/// embedder) build this struct and pass it to `Config::validate`, or
/// construct it programmatically and skip parsing entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub watch_roots: Vec<String>,
  pub allowed_extensions: Vec<String>,
  pub blocked_extensions: Vec<String>,
  pub ignore_files: Vec<String>,
  pub ignore_patterns: Vec<String>,
  pub max_file_size_bytes: u64,
  pub warn_file_size_bytes: u64,
  pub size_exceptions: Vec<String>,
  pub binary_threshold: f32,
  pub follow_symlinks: bool,
  pub max_symlink_depth: u32,
  pub debounce_ms: u64,
  pub worker_count: usize,
  pub embedding: EmbeddingConfig,
  pub chunking: ChunkingConfig,
  pub providers: ProvidersConfig,
  pub query: QueryConfig,
  pub budget: BudgetConfig,
  pub storage: StorageConfig,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      watch_roots: Vec::new(),
      allowed_extensions: Vec::new(),
      blocked_extensions: Vec::new(),
      ignore_files: vec![
        ".gitignore".to_string(),
        ".contextignore".to_string(),
        ".dockerignore".to_string(),
      ],
      ignore_patterns: Vec::new(),
      max_file_size_bytes: 2 * 1024 * 1024,
      warn_file_size_bytes: 512 * 1024,
      size_exceptions: Vec::new(),
      binary_threshold: 0.05,
      follow_symlinks: false,
      max_symlink_depth: 5,
      debounce_ms: 500,
      worker_count: num_cpus_fallback(),
      embedding: EmbeddingConfig::default(),
      chunking: ChunkingConfig::default(),
      providers: ProvidersConfig::default(),
      query: QueryConfig::default(),
      budget: BudgetConfig::default(),
      storage: StorageConfig::default(),
    }
  }
}

fn num_cpus_fallback() -> usize {
  std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

impl Config {
  /// Structural validation only; this is the boundary §1 reserves for
  /// `ConfigError`, the one error class fatal at init.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.watch_roots.is_empty() {
      return Err(ConfigError::Invalid("watch_roots must not be empty".to_string()));
    }
    if self.max_file_size_bytes == 0 {
      return Err(ConfigError::Invalid("max_file_size_bytes must be > 0".to_string()));
    }
    if self.warn_file_size_bytes > self.max_file_size_bytes {
      return Err(ConfigError::Invalid(
        "warn_file_size_bytes must not exceed max_file_size_bytes".to_string(),
      ));
    }
    if !(0.0..=1.0).contains(&self.binary_threshold) {
      return Err(ConfigError::Invalid("binary_threshold must be in [0, 1]".to_string()));
    }
    if self.worker_count == 0 {
      return Err(ConfigError::Invalid("worker_count must be > 0".to_string()));
    }
    self.embedding.validate()?;
    self.query.validate()?;
    if self.storage.db_path.trim().is_empty() {
      return Err(ConfigError::Invalid("storage.db_path must not be empty".to_string()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
  pub model_tag: String,
  pub dim: u32,
  pub normalize: bool,
  pub batch_size: usize,
}

impl Default for EmbeddingConfig {
  fn default() -> Self {
    EmbeddingConfig {
      model_tag: "bge-small-en-v1.5".to_string(),
      dim: 384,
      normalize: true,
      batch_size: 32,
    }
  }
}

impl EmbeddingConfig {
  fn validate(&self) -> Result<(), ConfigError> {
    if self.dim == 0 {
      return Err(ConfigError::Invalid("embedding.dim must be > 0".to_string()));
    }
    if self.batch_size == 0 {
      return Err(ConfigError::Invalid("embedding.batch_size must be > 0".to_string()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageChunkingConfig {
  pub max_tokens: u32,
  pub overlap_percent: f32,
}

impl Default for LanguageChunkingConfig {
  fn default() -> Self {
    LanguageChunkingConfig { max_tokens: 400, overlap_percent: 0.10 }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
  pub per_language: HashMap<String, LanguageChunkingConfig>,
}

impl Default for ChunkingConfig {
  fn default() -> Self {
    ChunkingConfig { per_language: HashMap::new() }
  }
}

impl ChunkingConfig {
  pub fn for_language(&self, language: &str) -> LanguageChunkingConfig {
    self.per_language.get(language).cloned().unwrap_or_default()
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
  pub enabled: bool,
  pub weight: f32,
}

impl Default for ProviderConfig {
  fn default() -> Self {
    ProviderConfig { enabled: true, weight: 1.0 }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
  pub semantic: ProviderConfig,
  pub symbol: ProviderConfig,
  pub full_text: ProviderConfig,
}

impl Default for ProvidersConfig {
  fn default() -> Self {
    ProvidersConfig {
      semantic: ProviderConfig { enabled: true, weight: 0.6 },
      symbol: ProviderConfig { enabled: true, weight: 0.2 },
      full_text: ProviderConfig { enabled: true, weight: 0.2 },
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
  pub default_k: usize,
  pub mmr_lambda: f32,
  pub min_score_threshold: f32,
  pub rerank_enabled: bool,
}

impl Default for QueryConfig {
  fn default() -> Self {
    QueryConfig {
      default_k: 10,
      mmr_lambda: 0.5,
      min_score_threshold: 0.0,
      rerank_enabled: true,
    }
  }
}

impl QueryConfig {
  fn validate(&self) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&self.mmr_lambda) {
      return Err(ConfigError::Invalid("query.mmr_lambda must be in [0, 1]".to_string()));
    }
    if self.default_k == 0 {
      return Err(ConfigError::Invalid("query.default_k must be > 0".to_string()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
  pub default_max_tokens: u32,
  pub reserve_for_prompt: u32,
}

impl Default for BudgetConfig {
  fn default() -> Self {
    BudgetConfig { default_max_tokens: 8000, reserve_for_prompt: 1000 }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  pub db_path: String,
}

impl Default for StorageConfig {
  fn default() -> Self {
    StorageConfig { db_path: "context.db".to_string() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_round_trips_through_json() {
    let mut cfg = Config::default();
    cfg.watch_roots.push("/tmp/project".to_string());
    let encoded = serde_json::to_string(&cfg).unwrap();
    let decoded: Config = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded.watch_roots, cfg.watch_roots);
    assert_eq!(decoded.embedding.dim, cfg.embedding.dim);
  }

  #[test]
  fn rejects_empty_watch_roots() {
    let cfg = Config::default();
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
  }

  #[test]
  fn accepts_minimal_valid_config() {
    let mut cfg = Config::default();
    cfg.watch_roots.push("/tmp/project".to_string());
    assert!(cfg.validate().is_ok());
  }

  #[test]
  fn rejects_out_of_range_mmr_lambda() {
    let mut cfg = Config::default();
    cfg.watch_roots.push("/tmp/project".to_string());
    cfg.query.mmr_lambda = 1.5;
    assert!(cfg.validate().is_err());
  }

  #[test]
  fn per_language_override_falls_back_to_default() {
    let cfg = ChunkingConfig::default();
    let python = cfg.for_language("python");
    assert_eq!(python.max_tokens, 400);
  }
}
