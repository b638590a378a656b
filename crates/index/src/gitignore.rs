//! Gitignore-style pattern matching with per-root caching.
//!
//! PathPolicy's ignore rule is the union of `.gitignore`, `.contextignore`
//! and `.dockerignore`, plus a fixed set of global patterns that apply
//! regardless of project-specific rules. Patterns are compiled once per
//! watch root and cached; the cache invalidates itself when any of those
//! files' mtimes change.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::SystemTime;

/// Patterns that apply to every watch root regardless of its own ignore files.
const GLOBAL_PATTERNS: &[&str] = &[
  ".git/",
  ".hg/",
  ".svn/",
  "node_modules/",
  "vendor/",
  ".venv/",
  "venv/",
  ".env/",
  "env/",
  "target/",
  "dist/",
  "build/",
  ".next/",
  ".nuxt/",
  ".cache/",
  "__pycache__/",
  ".pytest_cache/",
  ".mypy_cache/",
  ".ruff_cache/",
  ".tox/",
  "coverage/",
  ".coverage/",
  ".nyc_output/",
  "*.min.js",
  "*.min.css",
  "*.map",
  "package-lock.json",
  "bun.lock",
  "yarn.lock",
  "pnpm-lock.yaml",
  "Cargo.lock",
  "poetry.lock",
  "Pipfile.lock",
  "composer.lock",
  "Gemfile.lock",
];

/// The ignore files unioned at every watch root, matching `Config::ignore_files`'s default.
pub const DEFAULT_IGNORE_FILES: &[&str] = &[".gitignore", ".contextignore", ".dockerignore"];

struct CompiledIgnore {
  matcher: Gitignore,
  mtimes: Vec<Option<SystemTime>>,
}

/// Thread-safe cache of compiled ignore matchers, one per watch root.
pub struct GitignoreCache {
  cache: RwLock<HashMap<PathBuf, CompiledIgnore>>,
}

impl GitignoreCache {
  pub fn new() -> Self {
    Self { cache: RwLock::new(HashMap::new()) }
  }

  /// Check if `path` should be ignored under `root`, honoring global
  /// patterns, the configured ignore files and extra explicit patterns.
  pub fn should_ignore(&self, root: &Path, path: &Path, extra_patterns: &[String]) -> bool {
    {
      let cache = self.cache.read().unwrap();
      if let Some(compiled) = cache.get(root)
        && self.is_cache_valid(root, compiled)
      {
        return self.check_match(&compiled.matcher, root, path);
      }
    }
    let matcher = self.build_and_cache_matcher(root, extra_patterns);
    self.check_match(&matcher, root, path)
  }

  fn check_match(&self, matcher: &Gitignore, root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let is_dir = path.is_dir();
    matcher.matched_path_or_any_parents(relative, is_dir).is_ignore()
  }

  fn build_and_cache_matcher(&self, root: &Path, extra_patterns: &[String]) -> Gitignore {
    let matcher = self.build_matcher(root, extra_patterns);
    let mtimes = self.ignore_file_mtimes(root);
    let mut cache = self.cache.write().unwrap();
    cache.insert(root.to_path_buf(), CompiledIgnore { matcher: matcher.clone(), mtimes });
    matcher
  }

  fn build_matcher(&self, root: &Path, extra_patterns: &[String]) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in GLOBAL_PATTERNS {
      let _ = builder.add_line(None, pattern);
    }
    for pattern in extra_patterns {
      let _ = builder.add_line(None, pattern);
    }
    for filename in DEFAULT_IGNORE_FILES {
      let path = root.join(filename);
      if path.exists() {
        let _ = builder.add(&path);
      }
    }
    let exclude = root.join(".git/info/exclude");
    if exclude.exists() {
      let _ = builder.add(&exclude);
    }
    builder.build().unwrap_or_else(|_| {
      let mut fallback = GitignoreBuilder::new(root);
      for pattern in GLOBAL_PATTERNS {
        let _ = fallback.add_line(None, pattern);
      }
      fallback.build().unwrap()
    })
  }

  fn is_cache_valid(&self, root: &Path, compiled: &CompiledIgnore) -> bool {
    self.ignore_file_mtimes(root) == compiled.mtimes
  }

  fn ignore_file_mtimes(&self, root: &Path) -> Vec<Option<SystemTime>> {
    DEFAULT_IGNORE_FILES
      .iter()
      .map(|name| fs::metadata(root.join(name)).ok().and_then(|m| m.modified().ok()))
      .collect()
  }

  pub fn invalidate(&self, root: &Path) {
    self.cache.write().unwrap().remove(root);
  }

  pub fn clear(&self) {
    self.cache.write().unwrap().clear();
  }
}

impl Default for GitignoreCache {
  fn default() -> Self {
    Self::new()
  }
}

/// Process-wide cache shared by ChangeDetector, Bootstrap and the Watcher.
pub static GITIGNORE_CACHE: LazyLock<GitignoreCache> = LazyLock::new(GitignoreCache::new);

/// Hash of every unioned ignore file under `root`, including one level of
/// nesting, used to detect when ignore rules changed and a reconciliation
/// pass is warranted.
pub fn compute_ignore_hash(root: &Path) -> String {
  let mut hasher = Sha256::new();
  for filename in DEFAULT_IGNORE_FILES {
    let path = root.join(filename);
    if let Ok(content) = fs::read_to_string(&path) {
      hasher.update(filename.as_bytes());
      hasher.update(b":");
      hasher.update(content.as_bytes());
      hasher.update(b"\n");
    }
  }
  if let Ok(entries) = fs::read_dir(root) {
    for entry in entries.flatten() {
      if entry.file_type().is_ok_and(|t| t.is_dir()) {
        for filename in DEFAULT_IGNORE_FILES {
          let nested = entry.path().join(filename);
          if let Ok(content) = fs::read_to_string(&nested) {
            hasher.update(entry.file_name().to_string_lossy().as_bytes());
            hasher.update(format!("/{filename}:").as_bytes());
            hasher.update(content.as_bytes());
            hasher.update(b"\n");
          }
        }
      }
    }
  }
  format!("{:x}", hasher.finalize())
}
