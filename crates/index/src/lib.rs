//! Filesystem policy, ignore handling, chunking and change detection.

pub mod changes;
pub mod chunker;
pub mod gitignore;
pub mod policy;

pub use changes::{ChangeDetector, DiffResult, FileChange};
pub use chunker::{Chunker, ChunkerConfig};
pub use gitignore::{DEFAULT_IGNORE_FILES, GITIGNORE_CACHE, GitignoreCache, compute_ignore_hash};
pub use policy::{Decision, PathPolicy, SkipReason};
