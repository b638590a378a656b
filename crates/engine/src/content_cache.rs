use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded content cache used by the watcher to coalesce rapid edits and by
/// the indexer to avoid a redundant disk read right after a change event
/// already carried the new bytes.
pub struct ContentCache {
  entries: DashMap<PathBuf, String>,
  order: DashMap<PathBuf, usize>,
  tick: AtomicUsize,
  max_entries: usize,
  max_file_size: usize,
}

impl ContentCache {
  pub fn new(max_entries: usize, max_file_size: usize) -> Self {
    Self { entries: DashMap::new(), order: DashMap::new(), tick: AtomicUsize::new(0), max_entries, max_file_size }
  }

  pub fn get(&self, path: &Path) -> Option<String> {
    if let Some(content) = self.entries.get(path) {
      self.touch(path);
      return Some(content.clone());
    }
    None
  }

  pub fn insert(&self, path: PathBuf, content: String) {
    if content.len() > self.max_file_size {
      self.remove(&path);
      return;
    }
    if self.entries.len() >= self.max_entries && !self.entries.contains_key(&path) {
      self.evict_oldest();
    }
    self.touch(&path);
    self.entries.insert(path, content);
  }

  pub fn remove(&self, path: &Path) {
    self.entries.remove(path);
    self.order.remove(path);
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  fn touch(&self, path: &Path) {
    let tick = self.tick.fetch_add(1, Ordering::Relaxed);
    self.order.insert(path.to_path_buf(), tick);
  }

  fn evict_oldest(&self) {
    let oldest = self.order.iter().min_by_key(|e| *e.value()).map(|e| e.key().clone());
    if let Some(path) = oldest {
      self.entries.remove(&path);
      self.order.remove(&path);
    }
  }
}

impl Default for ContentCache {
  fn default() -> Self {
    Self::new(1000, 2 * 1024 * 1024)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn evicts_oldest_entry_past_capacity() {
    let cache = ContentCache::new(2, 1024);
    cache.insert(PathBuf::from("a"), "a".into());
    cache.insert(PathBuf::from("b"), "b".into());
    cache.insert(PathBuf::from("c"), "c".into());

    assert_eq!(cache.len(), 2);
    assert!(cache.get(&PathBuf::from("a")).is_none());
    assert!(cache.get(&PathBuf::from("c")).is_some());
  }

  #[test]
  fn rejects_oversized_content() {
    let cache = ContentCache::new(10, 4);
    cache.insert(PathBuf::from("big"), "too long".into());
    assert!(cache.get(&PathBuf::from("big")).is_none());
  }

  #[test]
  fn touching_an_entry_protects_it_from_eviction() {
    let cache = ContentCache::new(2, 1024);
    cache.insert(PathBuf::from("a"), "a".into());
    cache.insert(PathBuf::from("b"), "b".into());
    cache.get(&PathBuf::from("a"));
    cache.insert(PathBuf::from("c"), "c".into());

    assert!(cache.get(&PathBuf::from("a")).is_some());
    assert!(cache.get(&PathBuf::from("b")).is_none());
  }
}
