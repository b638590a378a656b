use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters per token estimate, used for every `token_count` in this crate.
pub const CHARS_PER_TOKEN: usize = 4;

pub fn estimate_tokens(text: &str) -> u32 {
  (text.len() / CHARS_PER_TOKEN).max(1) as u32
}

/// Languages the chunker and parser recognize by extension. Tier-2/3
/// grammars (Ruby, PHP, data formats) are recognized here even when the
/// parser crate's corresponding tree-sitter feature is compiled out; in
/// that case the chunker falls back to line-based chunking for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  TypeScript,
  JavaScript,
  Tsx,
  Jsx,
  Html,
  Css,
  Rust,
  Python,
  Go,
  Java,
  Kotlin,
  CSharp,
  Cpp,
  C,
  Ruby,
  Php,
  Shell,
  Json,
  Yaml,
  Toml,
  Markdown,
  PlainText,
}

impl Language {
  pub fn from_extension(ext: &str) -> Option<Self> {
    match ext.to_lowercase().as_str() {
      "ts" | "mts" => Some(Language::TypeScript),
      "js" | "mjs" | "cjs" => Some(Language::JavaScript),
      "tsx" => Some(Language::Tsx),
      "jsx" => Some(Language::Jsx),
      "html" | "htm" => Some(Language::Html),
      "css" => Some(Language::Css),
      "rs" => Some(Language::Rust),
      "py" | "pyi" | "pyw" => Some(Language::Python),
      "go" => Some(Language::Go),
      "java" => Some(Language::Java),
      "kt" | "kts" => Some(Language::Kotlin),
      "cs" => Some(Language::CSharp),
      "cpp" | "cc" | "cxx" | "hpp" | "hxx" => Some(Language::Cpp),
      "c" | "h" => Some(Language::C),
      "rb" | "rake" => Some(Language::Ruby),
      "php" => Some(Language::Php),
      "sh" | "bash" | "zsh" => Some(Language::Shell),
      "json" | "jsonc" => Some(Language::Json),
      "yaml" | "yml" => Some(Language::Yaml),
      "toml" => Some(Language::Toml),
      "md" | "markdown" => Some(Language::Markdown),
      "txt" => Some(Language::PlainText),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Language::TypeScript => "typescript",
      Language::JavaScript => "javascript",
      Language::Tsx => "tsx",
      Language::Jsx => "jsx",
      Language::Html => "html",
      Language::Css => "css",
      Language::Rust => "rust",
      Language::Python => "python",
      Language::Go => "go",
      Language::Java => "java",
      Language::Kotlin => "kotlin",
      Language::CSharp => "csharp",
      Language::Cpp => "cpp",
      Language::C => "c",
      Language::Ruby => "ruby",
      Language::Php => "php",
      Language::Shell => "bash",
      Language::Json => "json",
      Language::Yaml => "yaml",
      Language::Toml => "toml",
      Language::Markdown => "markdown",
      Language::PlainText => "plaintext",
    }
  }

  /// Whether the spec's "curly-brace code" chunking strategy applies.
  pub fn is_curly_brace(&self) -> bool {
    matches!(
      self,
      Language::TypeScript
        | Language::JavaScript
        | Language::Tsx
        | Language::Jsx
        | Language::Java
        | Language::Kotlin
        | Language::CSharp
        | Language::Cpp
        | Language::C
        | Language::Go
        | Language::Rust
        | Language::Php
    )
  }

  pub fn is_markdown(&self) -> bool {
    matches!(self, Language::Markdown)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
  Indexed,
  Pending,
  Outdated,
  Error,
}

/// One record per currently-known source file under a watch root.
///
/// `rel_path` is unique among non-deleted files; `is_deleted` is a tombstone
/// flag, never a row removal, so a deletion can be audited and so a later
/// re-creation of the same path gets a fresh `file_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
  pub file_id: Uuid,
  pub rel_path: String,
  pub language: Option<String>,
  pub size_bytes: u64,
  pub content_hash: String,
  pub last_modified_ms: i64,
  pub indexed_at_ms: i64,
  pub status: FileStatus,
  pub is_deleted: bool,
}

impl File {
  pub fn new(rel_path: impl Into<String>, content_hash: impl Into<String>) -> Self {
    let now = Utc::now().timestamp_millis();
    File {
      file_id: Uuid::new_v4(),
      rel_path: rel_path.into(),
      language: None,
      size_bytes: 0,
      content_hash: content_hash.into(),
      last_modified_ms: now,
      indexed_at_ms: now,
      status: FileStatus::Pending,
      is_deleted: false,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
  CodeClass,
  CodeFunction,
  CodeBlock,
  DocSection,
  DocParagraph,
  Text,
}

/// A contiguous text span of a file, the unit of embedding and retrieval.
///
/// `(file_id, ordinal)` is unique; `ordinal` is assigned in source order
/// starting at 0 by the chunker, never renumbered in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
  pub chunk_id: Uuid,
  pub file_id: Uuid,
  pub ordinal: u32,
  pub kind: ChunkKind,
  pub start_line: u32,
  pub end_line: u32,
  pub byte_start: u32,
  pub byte_end: u32,
  pub token_count: u32,
  pub text: String,
  pub summary: Option<String>,
}

impl Chunk {
  pub fn content_hash(&self) -> String {
    crate::hash::content_hash(self.text.as_bytes())
  }
}

/// One vector per chunk, 1:1; the Store cascades embeddings on chunk deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
  pub chunk_id: Uuid,
  pub dim: u32,
  pub vector: Vec<f32>,
  pub model_tag: String,
}

impl Embedding {
  pub fn norm(&self) -> f32 {
    self.vector.iter().map(|v| v * v).sum::<f32>().sqrt()
  }

  pub fn is_normalized(&self, epsilon: f32) -> bool {
    (self.norm() - 1.0).abs() <= epsilon
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
  Class,
  Function,
  Method,
  Variable,
  Heading,
}

/// Coarse symbol index entry; `chunk_id` must reference a live chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
  pub symbol_id: Uuid,
  pub chunk_id: Uuid,
  pub name: String,
  pub kind: SymbolKind,
  pub qualified_name: Option<String>,
}

/// Directional reference between chunks (e.g. import -> definition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
  pub source_chunk_id: Uuid,
  pub target_chunk_id: Uuid,
  pub relation: String,
}

/// Per-chunk retrieval counter, bumped each time the chunk is returned as a
/// search hit. Cascades with its owning chunk like `Symbol`/`Link`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageMetric {
  pub chunk_id: Uuid,
  pub hit_count: u64,
  pub last_accessed_ms: i64,
}

impl UsageMetric {
  pub fn new(chunk_id: Uuid) -> Self {
    UsageMetric { chunk_id, hit_count: 1, last_accessed_ms: now_ms() }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapState {
  Pending,
  InProgress,
  Done,
  Failed,
}

/// Resumable scan-progress row. A full rebuild clears this table before
/// enumeration; an incremental refresh leaves existing rows in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapProgress {
  pub rel_path: String,
  pub enqueued_at_ms: i64,
  pub state: BootstrapState,
  pub attempts: u32,
}

impl BootstrapProgress {
  pub fn new(rel_path: impl Into<String>) -> Self {
    BootstrapProgress {
      rel_path: rel_path.into(),
      enqueued_at_ms: Utc::now().timestamp_millis(),
      state: BootstrapState::Pending,
      attempts: 0,
    }
  }
}

/// Enabled/weight snapshot for one configured search provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderStatus {
  pub enabled: bool,
  pub weight: f32,
}

/// Aggregate counters returned by `Store::stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
  pub files: u64,
  pub chunks: u64,
  pub embeddings: u64,
  pub language_distribution: std::collections::BTreeMap<String, u64>,
  pub provider_status: std::collections::BTreeMap<String, ProviderStatus>,
}

pub fn now_ms() -> i64 {
  Utc::now().timestamp_millis()
}

pub fn to_datetime(ms: i64) -> DateTime<Utc> {
  DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}
