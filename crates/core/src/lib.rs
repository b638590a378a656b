pub mod config;
pub mod error;
pub mod hash;
pub mod model;

pub use config::Config;
pub use error::ConfigError;
pub use model::{
  BootstrapProgress, BootstrapState, Chunk, ChunkKind, Embedding, File, FileStatus, Language,
  Link, ProviderStatus, StoreStats, Symbol, SymbolKind, UsageMetric, CHARS_PER_TOKEN, estimate_tokens,
};
