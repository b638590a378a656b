use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
  #[error("language {0:?} has no tree-sitter grammar compiled in")]
  UnsupportedLanguage(context_core::Language),
  #[error("tree-sitter failed to produce a parse tree")]
  ParseFailed,
}
