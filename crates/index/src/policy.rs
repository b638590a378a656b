//! PathPolicy: decides whether a path is indexable.

use std::fs;
use std::path::{Path, PathBuf};

use context_core::Config;

use crate::gitignore::GITIGNORE_CACHE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
  OutOfRoot,
  Blocked,
  ExtensionNotAllowed,
  Ignored,
  IoError,
}

impl std::fmt::Display for SkipReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      SkipReason::OutOfRoot => "out_of_root",
      SkipReason::Blocked => "blocked",
      SkipReason::ExtensionNotAllowed => "extension",
      SkipReason::Ignored => "ignored",
      SkipReason::IoError => "io_error",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  Index,
  Skip(SkipReason),
  TooLarge,
  Binary,
  Ignored,
}

impl Decision {
  pub fn is_index(&self) -> bool {
    matches!(self, Decision::Index)
  }
}

/// Evaluates §4.1's six ordered rules against a single absolute path.
pub struct PathPolicy<'a> {
  config: &'a Config,
}

impl<'a> PathPolicy<'a> {
  pub fn new(config: &'a Config) -> Self {
    PathPolicy { config }
  }

  /// Resolve `abs_path` under one of the configured watch roots, following
  /// symlinks up to `max_symlink_depth`. Returns the canonical path and its
  /// watch root on success.
  fn resolve_under_root(&self, abs_path: &Path) -> Option<(PathBuf, PathBuf)> {
    let mut resolved = abs_path.to_path_buf();
    for _ in 0..=self.config.max_symlink_depth {
      match fs::symlink_metadata(&resolved) {
        Ok(meta) if meta.file_type().is_symlink() => {
          if !self.config.follow_symlinks {
            return None;
          }
          resolved = fs::read_link(&resolved).ok().map(|target| {
            if target.is_absolute() {
              target
            } else {
              resolved.parent().unwrap_or(Path::new("/")).join(target)
            }
          })?;
        }
        _ => break,
      }
    }
    for root in &self.config.watch_roots {
      let root_path = Path::new(root);
      if resolved.starts_with(root_path) {
        return Some((resolved, root_path.to_path_buf()));
      }
    }
    None
  }

  pub fn classify(&self, abs_path: &Path) -> Decision {
    let Some((resolved, root)) = self.resolve_under_root(abs_path) else {
      return Decision::Skip(SkipReason::OutOfRoot);
    };

    let ext = resolved.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();

    if self.config.blocked_extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)) {
      return Decision::Skip(SkipReason::Blocked);
    }
    if !self.config.allowed_extensions.is_empty()
      && !self.config.allowed_extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    {
      return Decision::Skip(SkipReason::ExtensionNotAllowed);
    }

    let rel = resolved.to_string_lossy().to_string();
    if GITIGNORE_CACHE.should_ignore(&root, &resolved, &self.config.ignore_patterns) {
      return Decision::Ignored;
    }

    let metadata = match fs::metadata(&resolved) {
      Ok(m) => m,
      Err(_) => return Decision::Skip(SkipReason::IoError),
    };

    let size = metadata.len();
    let is_exception = self.config.size_exceptions.iter().any(|p| rel.ends_with(p.as_str()));
    if size > self.config.max_file_size_bytes && !is_exception {
      return Decision::TooLarge;
    }
    if size > self.config.warn_file_size_bytes {
      tracing::warn!(path = %rel, size, "file exceeds warn_file_size_bytes, indexing anyway");
    }

    match self.looks_binary(&resolved) {
      Ok(true) => Decision::Binary,
      Ok(false) => Decision::Index,
      Err(_) => Decision::Skip(SkipReason::IoError),
    }
  }

  /// Inspect the first 8 KiB: a NUL byte or a non-UTF8 ratio above
  /// `binary_threshold` both mark the file binary.
  fn looks_binary(&self, path: &Path) -> std::io::Result<bool> {
    use std::io::Read;
    let mut file = fs::File::open(path)?;
    let mut buf = vec![0u8; 8192];
    let n = file.read(&mut buf)?;
    let buf = &buf[..n];
    if buf.contains(&0) {
      return Ok(true);
    }
    if buf.is_empty() {
      return Ok(false);
    }
    let invalid = count_invalid_utf8_bytes(buf);
    Ok(invalid as f32 / buf.len() as f32 > self.config.binary_threshold)
  }
}

/// Count bytes that are not part of a valid UTF-8 sequence, by repeatedly
/// skipping to just past each decoding error until the remainder is valid.
fn count_invalid_utf8_bytes(buf: &[u8]) -> usize {
  let mut invalid = 0;
  let mut rest = buf;
  loop {
    match std::str::from_utf8(rest) {
      Ok(_) => break,
      Err(e) => {
        let valid_up_to = e.valid_up_to();
        let bad_len = e.error_len().unwrap_or(rest.len() - valid_up_to);
        invalid += bad_len;
        rest = &rest[valid_up_to + bad_len..];
        if rest.is_empty() {
          break;
        }
      }
    }
  }
  invalid
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs as stdfs;
  use tempfile::TempDir;

  fn base_config(root: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.watch_roots = vec![root.to_string_lossy().to_string()];
    cfg
  }

  #[test]
  fn rejects_path_outside_watch_roots() {
    let dir = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    let cfg = base_config(dir.path());
    let policy = PathPolicy::new(&cfg);
    let path = other.path().join("a.rs");
    stdfs::write(&path, "fn main() {}").unwrap();
    assert_eq!(policy.classify(&path), Decision::Skip(SkipReason::OutOfRoot));
  }

  #[test]
  fn blocked_extension_is_skipped() {
    let dir = TempDir::new().unwrap();
    let mut cfg = base_config(dir.path());
    cfg.blocked_extensions = vec!["exe".to_string()];
    let policy = PathPolicy::new(&cfg);
    let path = dir.path().join("a.exe");
    stdfs::write(&path, b"binary").unwrap();
    assert_eq!(policy.classify(&path), Decision::Skip(SkipReason::Blocked));
  }

  #[test]
  fn allowed_extensions_restrict_when_non_empty() {
    let dir = TempDir::new().unwrap();
    let mut cfg = base_config(dir.path());
    cfg.allowed_extensions = vec!["md".to_string()];
    let policy = PathPolicy::new(&cfg);
    let rs_path = dir.path().join("a.rs");
    stdfs::write(&rs_path, "fn main() {}").unwrap();
    assert_eq!(policy.classify(&rs_path), Decision::Skip(SkipReason::ExtensionNotAllowed));

    let md_path = dir.path().join("a.md");
    stdfs::write(&md_path, "# hi").unwrap();
    assert_eq!(policy.classify(&md_path), Decision::Index);
  }

  #[test]
  fn gitignored_path_is_ignored() {
    let dir = TempDir::new().unwrap();
    stdfs::write(dir.path().join(".gitignore"), "build/\n").unwrap();
    let cfg = base_config(dir.path());
    let policy = PathPolicy::new(&cfg);
    let path = dir.path().join("build/x.md");
    stdfs::create_dir_all(path.parent().unwrap()).unwrap();
    stdfs::write(&path, "hi").unwrap();
    assert_eq!(policy.classify(&path), Decision::Ignored);
  }

  #[test]
  fn oversized_file_is_too_large_unless_excepted() {
    let dir = TempDir::new().unwrap();
    let mut cfg = base_config(dir.path());
    cfg.max_file_size_bytes = 4;
    let policy = PathPolicy::new(&cfg);
    let path = dir.path().join("big.md");
    stdfs::write(&path, "hello world").unwrap();
    assert_eq!(policy.classify(&path), Decision::TooLarge);

    cfg.size_exceptions = vec!["big.md".to_string()];
    let policy = PathPolicy::new(&cfg);
    assert_eq!(policy.classify(&path), Decision::Index);
  }

  #[test]
  fn nul_bytes_mark_binary() {
    let dir = TempDir::new().unwrap();
    let cfg = base_config(dir.path());
    let policy = PathPolicy::new(&cfg);
    let path = dir.path().join("bin.dat");
    stdfs::write(&path, [0u8, 1, 2, 3]).unwrap();
    assert_eq!(policy.classify(&path), Decision::Binary);
  }

  #[test]
  fn plain_text_is_indexed() {
    let dir = TempDir::new().unwrap();
    let cfg = base_config(dir.path());
    let policy = PathPolicy::new(&cfg);
    let path = dir.path().join("ok.md");
    stdfs::write(&path, "# Title\n\nhello world\n").unwrap();
    assert_eq!(policy.classify(&path), Decision::Index);
  }
}
