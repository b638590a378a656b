//! Tree-sitter based code parsing for context-engine.
//!
//! This crate provides accurate extraction of:
//! - Import statements
//! - Function/method calls
//! - Symbol definitions
//!
//! # Example
//! ```ignore
//! use context_parser::TreeSitterParser;
//! use context_core::Language;
//!
//! let mut parser = TreeSitterParser::new();
//! let imports = parser.extract_imports(code, Language::Rust);
//! let calls = parser.extract_calls(code, Language::Rust);
//! ```

mod error;
mod parser;
mod queries;
pub mod resolve;

pub use error::ParseError;
pub use parser::{Definition, DefinitionKind, TextEdit, TreeSitterParser};
pub use resolve::{import_matches_file, import_to_file_patterns, normalize_import, possible_resolutions};

// Re-export for convenience
pub use context_core::Language;
