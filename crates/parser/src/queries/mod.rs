//! Per-language tree-sitter query sets.

pub mod python;
pub mod rust;

use tree_sitter::{Language as TsLanguage, Query};

use crate::parser::LanguageQueries;
use context_core::Language;

/// Compile a query, discarding it (and logging) on failure rather than
/// panicking: an outdated query against a bumped grammar must degrade to
/// "no matches", not crash the indexer.
pub(crate) fn compile_query(grammar: &TsLanguage, source: &str) -> Option<Query> {
  match Query::new(grammar, source) {
    Ok(query) => Some(query),
    Err(err) => {
      tracing::warn!(error = %err, "failed to compile tree-sitter query");
      None
    }
  }
}

pub fn load_queries(lang: Language, grammar: &TsLanguage) -> LanguageQueries {
  match lang {
    Language::Rust => rust::queries(grammar),
    Language::Python => python::queries(grammar),
    _ => LanguageQueries { imports: None, calls: None, definitions: None },
  }
}
