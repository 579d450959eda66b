//! Code translator (C4): produces a natural-language description of each
//! chunk, used for the secondary embedding when dual embedding is on
//! (`config.chunking.dual_embedding`).
//!
//! Two implementations, both exposed unconditionally so callers choose: an
//! LLM-backed translator with an identity fallback on per-chunk failure, and
//! a cost-free template translator that needs no network access at all.

use std::path::Path;

use futures_util::future::join_all;

use crate::contextualiser::LlmProvider;
use crate::types::{Chunk, FileInfo};

/// `translate_batch`: one LLM call per chunk, run concurrently within a
/// file. A chunk whose call fails translates to its own raw content
/// (identity fallback) rather than poisoning the whole batch.
pub async fn translate_batch(provider: &dyn LlmProvider, chunks: &[Chunk], file: &FileInfo) -> Vec<String> {
    let futures = chunks.iter().map(|chunk| async move {
        let prompt = translation_prompt(file, chunk);
        provider
            .complete(&prompt)
            .await
            .map(|text| text.trim().to_string())
            .ok()
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| chunk.content.clone())
    });
    join_all(futures).await
}

fn translation_prompt(file: &FileInfo, chunk: &Chunk) -> String {
    format!(
        "Describe in plain prose what this {} code does, in 1-3 sentences, for someone searching by intent rather \
         than by syntax:\n\n{}",
        file.language.as_str(),
        chunk.content
    )
}

/// Cost-free template translation: composes a description from file path,
/// language, chunk type, line range, a regex-extracted top-level symbol
/// name, and a trimmed content preview. No network access.
pub fn translate_template(chunks: &[Chunk], file: &FileInfo) -> Vec<String> {
    chunks.iter().map(|chunk| translate_one_template(chunk, &file.relative_path, file.language.as_str())).collect()
}

fn translate_one_template(chunk: &Chunk, relative_path: &Path, language: &str) -> String {
    let symbol = extract_symbol_name(&chunk.content).or_else(|| chunk.metadata.get("function_name").cloned().or_else(|| chunk.metadata.get("class_name").cloned()));
    let preview = preview(&chunk.content, 160);

    match symbol {
        Some(name) => format!(
            "{} `{name}` in {} ({}:{}-{}): {preview}",
            chunk.chunk_type.as_str(),
            relative_path.display(),
            language,
            chunk.location.start_line,
            chunk.location.end_line,
        ),
        None => format!(
            "{} in {} ({}:{}-{}): {preview}",
            chunk.chunk_type.as_str(),
            relative_path.display(),
            language,
            chunk.location.start_line,
            chunk.location.end_line,
        ),
    }
}

/// Pull a top-level symbol name out of the chunk text via a light regex-free
/// scan: the first identifier following `fn`, `struct`, `class`, `def`,
/// `interface`, `trait`, `impl`, or `func` on its own line.
fn extract_symbol_name(content: &str) -> Option<String> {
    const KEYWORDS: [&str; 8] = ["fn", "struct", "class", "def", "interface", "trait", "impl", "func"];

    for line in content.lines() {
        let trimmed = line.trim_start();
        for keyword in KEYWORDS {
            if let Some(rest) = trimmed.strip_prefix(keyword) {
                if !rest.starts_with(char::is_whitespace) {
                    continue;
                }
                let name: String = rest
                    .trim_start()
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                if !name.is_empty() {
                    return Some(name);
                }
            }
        }
    }
    None
}

fn preview(content: &str, max_chars: usize) -> String {
    let collapsed: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let truncated: String = collapsed.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OmniError, OmniResult};
    use crate::types::{ChunkKind, Language, SourceLocation};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeProvider {
        responses: Mutex<Vec<OmniResult<String>>>,
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        async fn complete(&self, _prompt: &str) -> OmniResult<String> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(String::new())
            } else {
                responses.remove(0)
            }
        }
    }

    fn sample_file() -> FileInfo {
        FileInfo {
            file_path: Path::new("/repo/a.rs").to_path_buf(),
            relative_path: Path::new("a.rs").to_path_buf(),
            content: "fn greet() {\n    println!(\"hi\");\n}\n".to_string(),
            language: Language::Rust,
            size: 40,
            last_modified: 0,
        }
    }

    fn sample_chunk() -> Chunk {
        Chunk {
            content: "fn greet() {\n    println!(\"hi\");\n}".to_string(),
            location: SourceLocation::lines(1, 3),
            chunk_type: ChunkKind::Function,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_translate_batch_identity_fallback_on_error() {
        let provider = FakeProvider {
            responses: Mutex::new(vec![Err(OmniError::Internal("boom".to_string()))]),
        };
        let chunk = sample_chunk();
        let result = translate_batch(&provider, std::slice::from_ref(&chunk), &sample_file()).await;
        assert_eq!(result, vec![chunk.content]);
    }

    #[tokio::test]
    async fn test_translate_batch_uses_llm_output_when_available() {
        let provider = FakeProvider {
            responses: Mutex::new(vec![Ok("Prints a greeting.".to_string())]),
        };
        let result = translate_batch(&provider, &[sample_chunk()], &sample_file()).await;
        assert_eq!(result, vec!["Prints a greeting.".to_string()]);
    }

    #[test]
    fn test_extract_symbol_name_finds_function() {
        assert_eq!(extract_symbol_name("fn greet() {}"), Some("greet".to_string()));
        assert_eq!(extract_symbol_name("pub struct Widget { x: u32 }"), None);
        assert_eq!(extract_symbol_name("    struct Widget { x: u32 }"), Some("Widget".to_string()));
    }

    #[test]
    fn test_translate_template_includes_symbol_and_location() {
        let file = sample_file();
        let descriptions = translate_template(&[sample_chunk()], &file);
        assert_eq!(descriptions.len(), 1);
        assert!(descriptions[0].contains("greet"));
        assert!(descriptions[0].contains("a.rs"));
        assert!(descriptions[0].contains("1-3"));
    }

    #[test]
    fn test_preview_truncates_long_content() {
        let long = "a".repeat(300);
        let shown = preview(&long, 160);
        assert!(shown.ends_with("..."));
        assert!(shown.chars().count() <= 163);
    }
}
