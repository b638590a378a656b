use thiserror::Error;

/// Invalid or missing configuration. The only error class that is fatal at
/// init; every other error in the taxonomy is recoverable at the scope where
/// it occurs (§7).
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid configuration: {0}")]
  Invalid(String),
  #[error("failed to read config file {path}: {source}")]
  Io { path: String, #[source] source: std::io::Error },
  #[error("failed to parse config: {0}")]
  Parse(String),
}

/// The shared vocabulary every crate's own error enum maps onto, per the
/// propagation policy in §7: per-file errors never fail a batch, batch
/// errors never fail Bootstrap, Bootstrap failures never bring the engine
/// down. Each crate keeps its own concrete error type; this enum is what the
/// engine composes into when it reports error *kind* to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Config,
  Filesystem,
  PolicyRejection,
  Chunking,
  Embedding,
  Store,
  Timeout,
  Cancelled,
}

impl std::fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      ErrorKind::Config => "config",
      ErrorKind::Filesystem => "filesystem",
      ErrorKind::PolicyRejection => "policy_rejection",
      ErrorKind::Chunking => "chunking",
      ErrorKind::Embedding => "embedding",
      ErrorKind::Store => "store",
      ErrorKind::Timeout => "timeout",
      ErrorKind::Cancelled => "cancelled",
    };
    f.write_str(s)
  }
}
