//! ChangeDetector: diffs filesystem reality against persisted `File` rows.

use std::path::Path;
use std::time::SystemTime;

use context_core::{File as StoredFile, hash::content_hash};
use walkdir::WalkDir;

use crate::gitignore::GITIGNORE_CACHE;
use crate::policy::{Decision, PathPolicy};
use context_core::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
  Created { rel_path: String },
  Modified { rel_path: String, old_hash: String, new_hash: String },
  Deleted { rel_path: String },
}

impl FileChange {
  pub fn rel_path(&self) -> &str {
    match self {
      FileChange::Created { rel_path }
      | FileChange::Modified { rel_path, .. }
      | FileChange::Deleted { rel_path } => rel_path,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct DiffResult {
  pub created: Vec<FileChange>,
  pub modified: Vec<FileChange>,
  pub deleted: Vec<FileChange>,
}

impl DiffResult {
  pub fn total_changes(&self) -> usize {
    self.created.len() + self.modified.len() + self.deleted.len()
  }

  pub fn is_empty(&self) -> bool {
    self.total_changes() == 0
  }
}

struct FilesystemEntry {
  rel_path: String,
  abs_path: std::path::PathBuf,
  mtime_ms: i64,
}

/// Compares the filesystem under `config.watch_roots` against a snapshot of
/// currently-known files, using mtime as a cheap pre-filter and content hash
/// as the authoritative signal, exactly as §4.5 specifies.
pub struct ChangeDetector<'a> {
  config: &'a Config,
}

impl<'a> ChangeDetector<'a> {
  pub fn new(config: &'a Config) -> Self {
    ChangeDetector { config }
  }

  /// `known` is the current `listAllFiles()` snapshot from the Store,
  /// keyed by `rel_path`. Returns a deterministic, sorted diff.
  pub fn diff(&self, known: &[StoredFile]) -> DiffResult {
    let known_by_path: std::collections::HashMap<&str, &StoredFile> =
      known.iter().map(|f| (f.rel_path.as_str(), f)).collect();

    let on_disk = self.scan_filesystem();
    let on_disk_by_path: std::collections::HashMap<&str, &FilesystemEntry> =
      on_disk.iter().map(|e| (e.rel_path.as_str(), e)).collect();

    let mut created = Vec::new();
    let mut modified = Vec::new();
    let mut deleted = Vec::new();

    for entry in &on_disk {
      match known_by_path.get(entry.rel_path.as_str()) {
        None => created.push(FileChange::Created { rel_path: entry.rel_path.clone() }),
        Some(file) => {
          if self.is_modified(file, entry) {
            let new_hash = content_hash(&std::fs::read(&entry.abs_path).unwrap_or_default());
            modified.push(FileChange::Modified {
              rel_path: entry.rel_path.clone(),
              old_hash: file.content_hash.clone(),
              new_hash,
            });
          }
        }
      }
    }

    for file in known {
      if file.is_deleted {
        continue;
      }
      if !on_disk_by_path.contains_key(file.rel_path.as_str()) {
        deleted.push(FileChange::Deleted { rel_path: file.rel_path.clone() });
      }
    }

    created.sort_by(|a, b| a.rel_path().cmp(b.rel_path()));
    modified.sort_by(|a, b| a.rel_path().cmp(b.rel_path()));
    deleted.sort_by(|a, b| a.rel_path().cmp(b.rel_path()));

    DiffResult { created, modified, deleted }
  }

  /// Hash is authoritative; mtime is only a pre-filter, compared against
  /// `indexed_at_ms` with a 1s buffer to absorb clock-skew and filesystem
  /// mtime resolution, per the reconciliation pass described in §10.6.
  fn is_modified(&self, known: &StoredFile, on_disk: &FilesystemEntry) -> bool {
    const CLOCK_SKEW_BUFFER_MS: i64 = 1000;
    if on_disk.mtime_ms <= known.indexed_at_ms + CLOCK_SKEW_BUFFER_MS {
      return false;
    }
    let current_hash = content_hash(&std::fs::read(&on_disk.abs_path).unwrap_or_default());
    current_hash != known.content_hash
  }

  fn scan_filesystem(&self) -> Vec<FilesystemEntry> {
    let policy = PathPolicy::new(self.config);
    let mut out = Vec::new();
    for root in &self.config.watch_roots {
      let root_path = Path::new(root);
      for entry in WalkDir::new(root_path).follow_links(self.config.follow_symlinks).into_iter().filter_entry(|e| {
        if e.file_type().is_dir() {
          !GITIGNORE_CACHE.should_ignore(root_path, e.path(), &self.config.ignore_patterns)
        } else {
          true
        }
      }) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
          continue;
        }
        if policy.classify(entry.path()) != Decision::Index {
          continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let mtime_ms = metadata
          .modified()
          .ok()
          .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
          .map(|d| d.as_millis() as i64)
          .unwrap_or(0);
        let rel_path = entry.path().strip_prefix(root_path).unwrap_or(entry.path()).to_string_lossy().replace('\\', "/");
        out.push(FilesystemEntry { rel_path, abs_path: entry.path().to_path_buf(), mtime_ms });
      }
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use context_core::FileStatus;
  use std::fs;
  use tempfile::TempDir;

  fn config_for(root: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.watch_roots = vec![root.to_string_lossy().to_string()];
    cfg
  }

  #[test]
  fn detects_created_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.md"), "# hi\n").unwrap();
    let cfg = config_for(dir.path());
    let detector = ChangeDetector::new(&cfg);
    let diff = detector.diff(&[]);
    assert_eq!(diff.created.len(), 1);
    assert_eq!(diff.created[0].rel_path(), "a.md");
  }

  #[test]
  fn detects_deleted_file() {
    let dir = TempDir::new().unwrap();
    let cfg = config_for(dir.path());
    let detector = ChangeDetector::new(&cfg);
    let mut known = StoredFile::new("gone.md", "deadbeef");
    known.indexed_at_ms = context_core::model::now_ms();
    let diff = detector.diff(&[known]);
    assert_eq!(diff.deleted.len(), 1);
    assert_eq!(diff.deleted[0].rel_path(), "gone.md");
  }

  #[test]
  fn unchanged_file_produces_no_diff() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.md");
    fs::write(&path, "# hi\n").unwrap();
    let cfg = config_for(dir.path());
    let detector = ChangeDetector::new(&cfg);

    let hash = content_hash(&fs::read(&path).unwrap());
    let mut known = StoredFile::new("a.md", hash);
    known.status = FileStatus::Indexed;
    known.indexed_at_ms = context_core::model::now_ms() + 5000;

    let diff = detector.diff(&[known]);
    assert!(diff.is_empty());
  }

  #[test]
  fn modified_file_is_detected_by_hash() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.md");
    fs::write(&path, "# hi\n").unwrap();
    let cfg = config_for(dir.path());
    let detector = ChangeDetector::new(&cfg);

    let mut known = StoredFile::new("a.md", "stale-hash");
    known.indexed_at_ms = 0;
    let diff = detector.diff(&[known]);
    assert_eq!(diff.modified.len(), 1);
  }
}
