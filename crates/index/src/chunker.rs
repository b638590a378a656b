//! Chunker: splits file content into bounded, language-aware chunks.
//!
//! Strategy dispatch follows the definition-extraction approach the teacher
//! uses for code (one chunk per top-level definition, AST-derived via
//! `context-parser`), extended with the two non-code strategies the spec
//! requires: heading-based splitting for Markdown, and paragraph splitting
//! for everything else.

use context_core::{Chunk, ChunkKind, Language, estimate_tokens};
use context_parser::{Definition, DefinitionKind, TreeSitterParser};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
  pub max_tokens: u32,
  pub overlap_percent: f32,
  /// Markdown heading depth at or below which a new section starts.
  pub max_heading_level: u8,
}

impl Default for ChunkerConfig {
  fn default() -> Self {
    ChunkerConfig { max_tokens: 400, overlap_percent: 0.10, max_heading_level: 2 }
  }
}

pub struct Chunker {
  config: ChunkerConfig,
  ts_parser: TreeSitterParser,
}

impl Default for Chunker {
  fn default() -> Self {
    Chunker::new(ChunkerConfig::default())
  }
}

impl Chunker {
  pub fn new(config: ChunkerConfig) -> Self {
    Chunker { config, ts_parser: TreeSitterParser::new() }
  }

  /// Split `text` into chunk drafts for `file_id`. Ordinals are assigned in
  /// source order starting at 0. Callers are expected to have already
  /// short-circuited on an unchanged content hash (§4.2's "identical hash
  /// skips chunking entirely" belongs to the Indexer, not here).
  pub fn chunk(&mut self, file_id: Uuid, text: &str, language: Language) -> Vec<Chunk> {
    let mut drafts = if language.is_markdown() {
      self.chunk_markdown(text)
    } else if language.is_curly_brace() || language == Language::Python {
      let defs = self.chunk_by_definitions(text, language);
      if defs.is_empty() { self.chunk_plain_text(text) } else { defs }
    } else {
      self.chunk_plain_text(text)
    };

    for (ordinal, draft) in drafts.iter_mut().enumerate() {
      draft.file_id = file_id;
      draft.ordinal = ordinal as u32;
      draft.chunk_id = Uuid::new_v4();
    }
    drafts
  }

  fn chunk_by_definitions(&mut self, source: &str, language: Language) -> Vec<Chunk> {
    self.ts_parser.clear_cache();
    let definitions = self.ts_parser.extract_definitions_cached(source, language);
    if definitions.is_empty() {
      return Vec::new();
    }
    let lines: Vec<&str> = source.lines().collect();
    let mut defs: Vec<_> = definitions.into_iter().collect();
    defs.sort_by_key(|d| d.start_line);

    let mut chunks = Vec::new();
    let mut covered = std::collections::HashSet::new();
    for def in &defs {
      let def_lines: std::collections::HashSet<u32> = (def.start_line..=def.end_line).collect();
      if def_lines.is_subset(&covered) {
        continue;
      }
      for line in def.start_line..=def.end_line {
        covered.insert(line);
      }
      chunks.push(self.definition_chunk(def, &lines));
    }
    chunks.sort_by_key(|c| c.start_line);
    self.split_overlong(chunks, language)
  }

  fn definition_chunk(&self, def: &Definition, lines: &[&str]) -> Chunk {
    let start_idx = (def.start_line.saturating_sub(1)) as usize;
    let end_idx = (def.end_line as usize).min(lines.len());
    let doc_start = self.leading_doc_start(lines, start_idx);
    let body_start = doc_start.unwrap_or(start_idx);
    let text = lines[body_start..end_idx].join("\n");
    let kind = match def.kind {
      DefinitionKind::Function | DefinitionKind::Method => ChunkKind::CodeFunction,
      DefinitionKind::Class
      | DefinitionKind::Struct
      | DefinitionKind::Interface
      | DefinitionKind::Trait
      | DefinitionKind::Enum => ChunkKind::CodeClass,
      _ => ChunkKind::CodeBlock,
    };
    Chunk {
      chunk_id: Uuid::new_v4(),
      file_id: Uuid::nil(),
      ordinal: 0,
      kind,
      start_line: (body_start + 1) as u32,
      end_line: def.end_line,
      byte_start: 0,
      byte_end: text.len() as u32,
      token_count: estimate_tokens(&text),
      summary: Some(def.name.clone()),
      text,
    }
  }

  /// Scan backwards from a definition's first line for contiguous doc
  /// comments, returning the earliest line index that should be folded into
  /// the chunk.
  fn leading_doc_start(&self, lines: &[&str], def_start: usize) -> Option<usize> {
    if def_start == 0 {
      return None;
    }
    let mut i = def_start - 1;
    let mut doc_lines = 0usize;
    loop {
      let line = lines[i].trim();
      let is_doc = line.starts_with("///")
        || line.starts_with("//!")
        || line.starts_with("/**")
        || line.starts_with('*')
        || line.starts_with("//")
        || line.starts_with('#')
        || line.starts_with('@');
      if is_doc {
        doc_lines += 1;
      } else if !line.is_empty() {
        break;
      }
      if i == 0 {
        break;
      }
      i -= 1;
    }
    if doc_lines == 0 { None } else { Some(def_start - doc_lines) }
  }

  /// Split any chunk whose estimated tokens exceed `max_tokens`, per §4.2's
  /// universal constraint. An overlong `CodeClass` body is decomposed along
  /// its nested method boundaries (the class keeps only its signature);
  /// anything else falls back to a mechanical line-boundary split.
  fn split_overlong(&mut self, chunks: Vec<Chunk>, language: Language) -> Vec<Chunk> {
    let mut out = Vec::with_capacity(chunks.len());
    for chunk in chunks {
      if chunk.token_count <= self.config.max_tokens {
        out.push(chunk);
        continue;
      }
      if chunk.kind == ChunkKind::CodeClass {
        out.extend(self.split_class_body(&chunk, language));
      } else {
        out.extend(self.split_by_lines(&chunk.text, chunk.start_line, chunk.kind, chunk.summary.clone()));
      }
    }
    out
  }

  /// Re-parses an overlong class chunk's own text to recover its nested
  /// method definitions, emitting each as its own `CodeFunction` chunk and
  /// keeping only the leading signature (and any trailing fields/braces) in
  /// the `CodeClass` chunk. Falls back to a mechanical line split when no
  /// nested methods are found (e.g. a single oversized method or enum body).
  fn split_class_body(&mut self, chunk: &Chunk, language: Language) -> Vec<Chunk> {
    self.ts_parser.clear_cache();
    let mut methods: Vec<_> = self
      .ts_parser
      .extract_definitions_cached(&chunk.text, language)
      .into_iter()
      .filter(|d| matches!(d.kind, DefinitionKind::Function | DefinitionKind::Method))
      .collect();
    if methods.is_empty() {
      return self.split_by_lines(&chunk.text, chunk.start_line, chunk.kind, chunk.summary.clone());
    }
    methods.sort_by_key(|d| d.start_line);

    let local_lines: Vec<&str> = chunk.text.lines().collect();
    let line_offset = chunk.start_line.saturating_sub(1);
    let first_start_idx = (methods[0].start_line.saturating_sub(1)) as usize;
    let header_end_idx = self.leading_doc_start(&local_lines, first_start_idx).unwrap_or(first_start_idx).max(1);

    let header_text: String = local_lines[0..header_end_idx].join("\n");
    let mut out = vec![Chunk {
      chunk_id: Uuid::new_v4(),
      file_id: Uuid::nil(),
      ordinal: 0,
      kind: ChunkKind::CodeClass,
      start_line: chunk.start_line,
      end_line: line_offset + header_end_idx as u32,
      byte_start: 0,
      byte_end: header_text.len() as u32,
      token_count: estimate_tokens(&header_text),
      summary: chunk.summary.clone(),
      text: header_text,
    }];

    for def in &methods {
      let mut method_chunk = self.definition_chunk(def, &local_lines);
      method_chunk.start_line += line_offset;
      method_chunk.end_line += line_offset;
      out.push(method_chunk);
    }

    let last_end_idx = methods.last().unwrap().end_line as usize;
    if last_end_idx < local_lines.len() {
      let trailing = local_lines[last_end_idx..].join("\n");
      if !trailing.trim().is_empty() {
        if let Some(last) = out.last_mut() {
          last.text.push('\n');
          last.text.push_str(&trailing);
          last.end_line += (local_lines.len() - last_end_idx) as u32;
          last.byte_end = last.text.len() as u32;
          last.token_count = estimate_tokens(&last.text);
        }
      }
    }

    out
  }

  fn chunk_plain_text(&self, text: &str) -> Vec<Chunk> {
    let paragraphs = split_paragraphs(text);
    let mut chunks = Vec::new();
    let mut line_cursor = 1u32;
    let overlap_chars = ((self.config.max_tokens as f32 * self.config.overlap_percent) as usize)
      * context_core::CHARS_PER_TOKEN;

    let mut buffer = String::new();
    let mut buffer_start_line = line_cursor;
    for (para, line_count) in paragraphs {
      if estimate_tokens(&buffer) + estimate_tokens(&para) > self.config.max_tokens && !buffer.is_empty() {
        chunks.push(self.text_chunk(&buffer, buffer_start_line, line_cursor - 1, ChunkKind::Text));
        let tail: String = buffer.chars().rev().take(overlap_chars).collect::<Vec<_>>().into_iter().rev().collect();
        buffer = tail;
        buffer_start_line = line_cursor;
      }
      if !buffer.is_empty() {
        buffer.push_str("\n\n");
      }
      buffer.push_str(&para);
      line_cursor += line_count;
    }
    if !buffer.trim().is_empty() {
      chunks.push(self.text_chunk(&buffer, buffer_start_line, line_cursor - 1, ChunkKind::Text));
    }
    if chunks.is_empty() && !text.trim().is_empty() {
      chunks.push(self.text_chunk(text, 1, text.lines().count().max(1) as u32, ChunkKind::Text));
    }
    chunks
  }

  fn chunk_markdown(&mut self, text: &str) -> Vec<Chunk> {
    let lines: Vec<&str> = text.lines().collect();
    let mut sections: Vec<(usize, usize, Option<String>)> = Vec::new();
    let mut current_start = 0usize;
    let mut current_heading: Option<String> = None;
    let mut in_code_fence = false;

    for (idx, line) in lines.iter().enumerate() {
      if line.trim_start().starts_with("```") {
        in_code_fence = !in_code_fence;
        continue;
      }
      if in_code_fence {
        continue;
      }
      if let Some(level) = heading_level(line) {
        if level as u8 <= self.config.max_heading_level {
          if idx > current_start {
            sections.push((current_start, idx - 1, current_heading.take()));
          }
          current_start = idx;
          current_heading = Some(line.trim_start_matches('#').trim().to_string());
        }
      }
    }
    sections.push((current_start, lines.len().saturating_sub(1), current_heading));

    let mut chunks = Vec::new();
    for (start, end, heading) in sections {
      if start > end {
        continue;
      }
      let text = lines[start..=end].join("\n");
      if text.trim().is_empty() {
        continue;
      }
      chunks.push(Chunk {
        chunk_id: Uuid::new_v4(),
        file_id: Uuid::nil(),
        ordinal: 0,
        kind: ChunkKind::DocSection,
        start_line: (start + 1) as u32,
        end_line: (end + 1) as u32,
        byte_start: 0,
        byte_end: text.len() as u32,
        token_count: estimate_tokens(&text),
        summary: heading,
        text,
      });
    }
    self.split_overlong(chunks, Language::Markdown)
  }

  fn split_by_lines(&self, text: &str, start_line: u32, kind: ChunkKind, summary: Option<String>) -> Vec<Chunk> {
    let lines: Vec<&str> = text.lines().collect();
    let max_chars = self.config.max_tokens as usize * context_core::CHARS_PER_TOKEN;
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_start = 0usize;
    for (i, line) in lines.iter().enumerate() {
      if buf.len() + line.len() > max_chars && !buf.is_empty() {
        chunks.push(Chunk {
          chunk_id: Uuid::new_v4(),
          file_id: Uuid::nil(),
          ordinal: 0,
          kind,
          start_line: start_line + buf_start as u32,
          end_line: start_line + i as u32 - 1,
          byte_start: 0,
          byte_end: buf.len() as u32,
          token_count: estimate_tokens(&buf),
          summary: summary.clone(),
          text: std::mem::take(&mut buf),
        });
        buf_start = i;
      }
      if !buf.is_empty() {
        buf.push('\n');
      }
      buf.push_str(line);
    }
    if !buf.trim().is_empty() {
      chunks.push(Chunk {
        chunk_id: Uuid::new_v4(),
        file_id: Uuid::nil(),
        ordinal: 0,
        kind,
        start_line: start_line + buf_start as u32,
        end_line: start_line + lines.len() as u32 - 1,
        byte_start: 0,
        byte_end: buf.len() as u32,
        token_count: estimate_tokens(&buf),
        summary,
        text: buf,
      });
    }
    chunks
  }

  fn text_chunk(&self, text: &str, start_line: u32, end_line: u32, kind: ChunkKind) -> Chunk {
    Chunk {
      chunk_id: Uuid::new_v4(),
      file_id: Uuid::nil(),
      ordinal: 0,
      kind,
      start_line,
      end_line,
      byte_start: 0,
      byte_end: text.len() as u32,
      token_count: estimate_tokens(text),
      summary: None,
      text: text.to_string(),
    }
  }
}

fn heading_level(line: &str) -> Option<usize> {
  let trimmed = line.trim_start();
  if !trimmed.starts_with('#') {
    return None;
  }
  let level = trimmed.chars().take_while(|c| *c == '#').count();
  let rest = &trimmed[level..];
  if level <= 6 && rest.starts_with(' ') { Some(level) } else { None }
}

/// Split on blank-line-delimited paragraphs, returning each paragraph along
/// with the number of source lines (including its trailing blank line) it consumed.
fn split_paragraphs(text: &str) -> Vec<(String, u32)> {
  let mut out = Vec::new();
  let mut buf = Vec::new();
  let mut consumed = 0u32;
  for line in text.lines() {
    consumed += 1;
    if line.trim().is_empty() {
      if !buf.is_empty() {
        out.push((buf.join("\n"), consumed));
        buf.clear();
        consumed = 0;
      }
      continue;
    }
    buf.push(line);
  }
  if !buf.is_empty() {
    out.push((buf.join("\n"), consumed));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn markdown_splits_at_headings() {
    let mut chunker = Chunker::default();
    let text = "# Title\n\nhello world\n";
    let chunks = chunker.chunk(Uuid::new_v4(), text, Language::Markdown);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].kind, ChunkKind::DocSection);
    assert_eq!(chunks[0].summary.as_deref(), Some("Title"));
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks[0].end_line, 3);
  }

  #[test]
  fn markdown_preserves_code_fences() {
    let mut chunker = Chunker::default();
    let text = "# A\n\n```\n# not a heading\n```\n\n# B\nbody\n";
    let chunks = chunker.chunk(Uuid::new_v4(), text, Language::Markdown);
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].text.contains("not a heading"));
  }

  #[test]
  fn ordinals_are_dense_and_source_ordered() {
    let mut chunker = Chunker::default();
    let text = "# A\n\nfirst\n\n# B\n\nsecond\n";
    let chunks = chunker.chunk(Uuid::new_v4(), text, Language::Markdown);
    for (i, c) in chunks.iter().enumerate() {
      assert_eq!(c.ordinal, i as u32);
    }
  }

  #[test]
  fn plain_text_falls_back_to_paragraphs() {
    let mut chunker = Chunker::default();
    let text = "first paragraph\nsecond line\n\nsecond paragraph\n";
    let chunks = chunker.chunk(Uuid::new_v4(), text, Language::PlainText);
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c.kind == ChunkKind::Text));
  }

  #[test]
  fn rust_function_becomes_code_function_chunk() {
    let mut chunker = Chunker::default();
    let text = "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n";
    let chunks = chunker.chunk(Uuid::new_v4(), text, Language::Rust);
    assert!(chunks.iter().any(|c| c.kind == ChunkKind::CodeFunction));
  }

  #[test]
  fn overlong_class_splits_nested_methods_into_code_function_chunks() {
    let mut chunker = Chunker::new(ChunkerConfig { max_tokens: 50, overlap_percent: 0.10, max_heading_level: 2 });
    let filler = "        value = 1\n".repeat(40);
    let text = format!("class Widget:\n    def method_one(self):\n{filler}    def method_two(self):\n{filler}");
    let chunks = chunker.chunk(Uuid::new_v4(), &text, Language::Python);

    let class_chunks: Vec<_> = chunks.iter().filter(|c| c.kind == ChunkKind::CodeClass).collect();
    let function_chunks: Vec<_> = chunks.iter().filter(|c| c.kind == ChunkKind::CodeFunction).collect();
    assert_eq!(class_chunks.len(), 1, "expected exactly one class signature chunk, got {chunks:?}");
    assert_eq!(function_chunks.len(), 2, "expected one CodeFunction chunk per method, got {chunks:?}");
    assert!(class_chunks[0].text.contains("class Widget"));
    assert!(!class_chunks[0].text.contains("value = 1"), "class chunk must not keep method bodies");
    assert!(function_chunks.iter().any(|c| c.text.contains("method_one")));
    assert!(function_chunks.iter().any(|c| c.text.contains("method_two")));
  }

  #[test]
  fn all_chunks_share_file_id() {
    let mut chunker = Chunker::default();
    let file_id = Uuid::new_v4();
    let text = "# A\n\nbody\n";
    let chunks = chunker.chunk(file_id, text, Language::Markdown);
    assert!(chunks.iter().all(|c| c.file_id == file_id));
  }
}
