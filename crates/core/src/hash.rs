use sha2::{Digest, Sha256};

/// Content hash used as the authoritative "did this change?" signal
/// throughout the engine (ChangeDetector, Indexer, Store). Truncated to
/// 16 hex chars: collision probability is negligible at the scale of a
/// single project's file/chunk counts, and the short form keeps index
/// columns compact.
pub fn content_hash(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  let digest = hasher.finalize();
  format!("{:016x}", u64::from_be_bytes(digest[0..8].try_into().unwrap()))
}
