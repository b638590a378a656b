use std::sync::Arc;

use anyhow::{Result, bail};
use context_core::ChunkKind;
use context_engine::{Engine, SearchFilter};

#[allow(clippy::too_many_arguments)]
pub async fn cmd_query(
  engine: Arc<Engine>,
  query: String,
  k: Option<usize>,
  max_tokens: Option<u32>,
  paths: Vec<String>,
  languages: Vec<String>,
  kinds: Vec<String>,
  json: bool,
) -> Result<()> {
  let kinds = kinds.iter().map(|k| parse_kind(k)).collect::<Result<Vec<_>>>()?;
  let filter = SearchFilter { paths, languages, kinds, exclude_patterns: Vec::new() };
  let result = engine.query(&query, k, max_tokens, Some(filter)).await?;

  if json {
    println!("{}", serde_json::to_string_pretty(&result)?);
    return Ok(());
  }

  for hit in &result.hits {
    println!("{}:{}-{}  (score {:.3})", hit.rel_path, hit.start_line, hit.end_line, hit.score);
    println!("{}", hit.text);
    println!();
  }
  if result.hits.is_empty() {
    println!("no matches");
  }
  Ok(())
}

fn parse_kind(raw: &str) -> Result<ChunkKind> {
  Ok(match raw {
    "code_class" => ChunkKind::CodeClass,
    "code_function" => ChunkKind::CodeFunction,
    "code_block" => ChunkKind::CodeBlock,
    "doc_section" => ChunkKind::DocSection,
    "doc_paragraph" => ChunkKind::DocParagraph,
    "text" => ChunkKind::Text,
    other => bail!("unknown chunk kind '{other}'"),
  })
}
