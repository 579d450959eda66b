//! AST chunker (C2): turns a file into a finite, non-empty list of
//! [`Chunk`]s that respect structural boundaries where a grammar exists,
//! and a line-based fallback where it doesn't.
//!
//! Pipeline (§4.2): whitelist-node extraction → empty-node skip → whole-file
//! fallback when nothing matched → size-based refine → character overlap.

use std::collections::HashMap;
use std::path::Path;

use crate::config::Config;
use crate::error::OmniResult;
use crate::parser::{self, StructuralElement};
use crate::types::{Chunk, ChunkKind, SourceLocation};

/// Chunk one file's content into [`Chunk`]s per `config.chunking`.
///
/// Always returns a non-empty vector when `content` is non-empty: either
/// the file parses and whitelist nodes are found, or the whole file is
/// emitted as a single `ChunkKind::File` chunk, refined and overlapped the
/// same as any other chunk set.
pub fn chunk_file(file_path: &Path, content: &str, language: crate::types::Language, config: &Config) -> Vec<Chunk> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let raw = if language == crate::types::Language::Unknown {
        Vec::new()
    } else {
        match parser::parse_file(file_path, content.as_bytes(), language) {
            Ok(elements) => elements_to_chunks(elements, content),
            Err(_) => return fallback_chunk(content, config),
        }
    };

    let chunks = if raw.is_empty() {
        vec![whole_file_chunk(content)]
    } else {
        raw
    };

    let refined = refine(chunks, config.chunking.size as usize);
    overlap(refined, config.chunking.overlap as usize)
}

/// Convert AST structural elements into chunks, skipping nodes whose
/// trimmed text is empty (step 2 of §4.2).
fn elements_to_chunks(elements: Vec<StructuralElement>, _content: &str) -> Vec<Chunk> {
    elements
        .into_iter()
        .filter(|e| !e.content.trim().is_empty())
        .map(|e| {
            let mut metadata = HashMap::new();
            metadata.insert("symbol_path".to_string(), e.symbol_path.clone());
            metadata.insert("visibility".to_string(), e.visibility.as_str().to_string());
            if let Some(doc) = &e.doc_comment {
                metadata.insert("doc_comment".to_string(), doc.clone());
            }
            match e.kind {
                ChunkKind::Function | ChunkKind::Test => {
                    metadata.insert("function_name".to_string(), e.name.clone());
                }
                ChunkKind::Class | ChunkKind::Trait | ChunkKind::Impl => {
                    metadata.insert("class_name".to_string(), e.name.clone());
                }
                _ => {}
            }

            Chunk {
                content: e.content,
                location: SourceLocation::lines(e.line_start, e.line_end),
                chunk_type: e.kind,
                metadata,
            }
        })
        .collect()
}

fn whole_file_chunk(content: &str) -> Chunk {
    let line_count = content.lines().count().max(1) as u32;
    Chunk {
        content: content.to_string(),
        location: SourceLocation::lines(1, line_count),
        chunk_type: ChunkKind::File,
        metadata: HashMap::new(),
    }
}

/// Re-split any chunk whose content exceeds `chunk_size` characters into
/// line-based sub-chunks, each inheriting `chunk_type` and metadata.
fn refine(chunks: Vec<Chunk>, chunk_size: usize) -> Vec<Chunk> {
    if chunk_size == 0 {
        return chunks;
    }
    chunks.into_iter().flat_map(|chunk| refine_one(chunk, chunk_size)).collect()
}

fn refine_one(chunk: Chunk, chunk_size: usize) -> Vec<Chunk> {
    if chunk.content.len() <= chunk_size {
        return vec![chunk];
    }

    let lines: Vec<&str> = chunk.content.lines().collect();
    let mut sub_chunks = Vec::new();
    let mut current_lines: Vec<&str> = Vec::new();
    let mut current_len = 0usize;
    let mut start_line = chunk.location.start_line;
    let mut line_cursor = chunk.location.start_line;

    for line in &lines {
        let line_len = line.len() + 1;
        if current_len + line_len > chunk_size && !current_lines.is_empty() {
            sub_chunks.push(build_sub_chunk(&chunk, &current_lines, start_line, line_cursor - 1));
            current_lines.clear();
            current_len = 0;
            start_line = line_cursor;
        }
        current_lines.push(line);
        current_len += line_len;
        line_cursor += 1;
    }

    if !current_lines.is_empty() {
        sub_chunks.push(build_sub_chunk(&chunk, &current_lines, start_line, line_cursor - 1));
    }

    if sub_chunks.is_empty() {
        vec![chunk]
    } else {
        sub_chunks
    }
}

fn build_sub_chunk(parent: &Chunk, lines: &[&str], start_line: u32, end_line: u32) -> Chunk {
    Chunk {
        content: lines.join("\n"),
        location: SourceLocation::lines(start_line, end_line),
        chunk_type: parent.chunk_type,
        metadata: parent.metadata.clone(),
    }
}

/// Prepend the last `overlap` characters of the previous chunk to each
/// chunk after the first, backdating `start_line` by the overlap prefix's
/// newline count (step 5 of §4.2).
fn overlap(chunks: Vec<Chunk>, overlap: usize) -> Vec<Chunk> {
    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut result = Vec::with_capacity(chunks.len());
    let mut previous_tail: Option<String> = None;

    for chunk in chunks {
        match previous_tail.take() {
            None => {
                previous_tail = Some(tail(&chunk.content, overlap));
                result.push(chunk);
            }
            Some(prefix) => {
                let backdate = prefix.matches('\n').count() as u32;
                let new_start = chunk.location.start_line.saturating_sub(backdate).max(1);
                let mut location = chunk.location;
                location.start_line = new_start;
                let new_content = format!("{prefix}{}", chunk.content);
                previous_tail = Some(tail(&chunk.content, overlap));
                result.push(Chunk {
                    content: new_content,
                    location,
                    chunk_type: chunk.chunk_type,
                    metadata: chunk.metadata,
                });
            }
        }
    }

    result
}

fn tail(content: &str, overlap: usize) -> String {
    if content.len() <= overlap {
        content.to_string()
    } else {
        let start = content.len() - overlap;
        let boundary = (start..=content.len()).find(|&i| content.is_char_boundary(i)).unwrap_or(content.len());
        content[boundary..].to_string()
    }
}

/// Line-based fallback for unknown languages or parse failures: greedy line
/// accumulation up to `chunk_size` characters, overlap approximated as
/// `chunk_overlap / 50` lines (step 6 of §4.2).
fn fallback_chunk(content: &str, config: &Config) -> Vec<Chunk> {
    let chunk_size = config.chunking.size as usize;
    let overlap_lines = (config.chunking.overlap as usize / 50).max(0);
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut i = 0usize;
    while i < lines.len() {
        let mut current_len = 0usize;
        let mut j = i;
        while j < lines.len() && (current_len == 0 || current_len + lines[j].len() + 1 <= chunk_size) {
            current_len += lines[j].len() + 1;
            j += 1;
        }
        let slice = &lines[i..j];
        chunks.push(Chunk {
            content: slice.join("\n"),
            location: SourceLocation::lines(i as u32 + 1, j as u32),
            chunk_type: ChunkKind::Block,
            metadata: HashMap::new(),
        });

        if j >= lines.len() {
            break;
        }
        i = j.saturating_sub(overlap_lines).max(i + 1);
    }

    chunks
}

/// Chunk a file already loaded by the loader (convenience wrapper).
pub fn chunk(file: &crate::types::FileInfo, config: &Config) -> OmniResult<Vec<Chunk>> {
    Ok(chunk_file(&file.relative_path, &file.content, file.language, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;

    fn config_with(size: u32, overlap: u32) -> Config {
        let mut config = Config::default();
        config.chunking.size = size;
        config.chunking.overlap = overlap;
        config
    }

    #[test]
    fn test_unknown_language_falls_back_to_line_chunker() {
        let config = config_with(40, 0);
        let content = "line one\nline two\nline three\nline four\nline five\n";
        let chunks = chunk_file(Path::new("notes.txt"), content, Language::Unknown, &config);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkKind::Block));
    }

    #[test]
    fn test_rust_file_splits_on_function_boundaries() {
        let config = config_with(2500, 0);
        let content = "fn a() {\n    1\n}\n\nfn b() {\n    2\n}\n";
        let chunks = chunk_file(Path::new("a.rs"), content, Language::Rust, &config);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().any(|c| c.chunk_type == ChunkKind::Function));
    }

    #[test]
    fn test_empty_content_produces_no_chunks() {
        let config = Config::default();
        let chunks = chunk_file(Path::new("empty.rs"), "", Language::Rust, &config);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_refine_splits_oversized_chunk() {
        let big = Chunk {
            content: "a".repeat(100),
            location: SourceLocation::lines(1, 1),
            chunk_type: ChunkKind::Function,
            metadata: HashMap::new(),
        };
        let refined = refine(vec![big], 30);
        assert!(refined.len() > 1);
        assert!(refined.iter().all(|c| c.content.len() <= 31));
    }

    #[test]
    fn test_overlap_prepends_previous_tail_and_backdates_start_line() {
        let a = Chunk {
            content: "one\ntwo\nthree".to_string(),
            location: SourceLocation::lines(1, 3),
            chunk_type: ChunkKind::Block,
            metadata: HashMap::new(),
        };
        let b = Chunk {
            content: "four\nfive".to_string(),
            location: SourceLocation::lines(4, 5),
            chunk_type: ChunkKind::Block,
            metadata: HashMap::new(),
        };
        let overlapped = overlap(vec![a, b], 4);
        assert_eq!(overlapped[0].location.start_line, 1);
        assert!(overlapped[1].content.starts_with("ree\n") || overlapped[1].content.len() > "four\nfive".len());
        assert!(overlapped[1].location.start_line <= 4);
    }

    #[test]
    fn test_overlap_noop_for_single_chunk() {
        let a = Chunk {
            content: "solo".to_string(),
            location: SourceLocation::lines(1, 1),
            chunk_type: ChunkKind::Block,
            metadata: HashMap::new(),
        };
        let result = overlap(vec![a.clone()], 10);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].content, a.content);
    }

    #[test]
    fn test_fallback_chunker_respects_chunk_size() {
        let config = config_with(20, 0);
        let content = "aaaaaaaaaa\nbbbbbbbbbb\ncccccccccc\ndddddddddd\n";
        let chunks = fallback_chunk(content, &config);
        assert!(chunks.len() >= 2);
    }
}
