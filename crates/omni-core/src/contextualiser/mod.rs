//! LLM contextualiser (C3): attaches a short retrieval context to each chunk.
//!
//! Two modes selected by `config.chunking.contextual_chunking`:
//! - fast per-chunk mode, one LLM call per chunk, all chunks of a file in
//!   parallel, empty context on any per-chunk failure;
//! - single-call mode, one LLM call per file that both (re-)chunks and
//!   contextualises via a structured envelope, with one refined-prompt retry
//!   on parse failure before falling back to a whole-file chunk.
//!
//! [`HttpLlmProvider`] is the shared chat-completion client used here and by
//! the translator (C4); both are thin callers over the same kind of
//! completion endpoint, gated through the same [`CircuitBreaker`] pattern as
//! the embedder and reranker.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::breaker::{is_quota_error, CircuitBreaker, ProviderErrorInfo};
use crate::config::LlmConfig;
use crate::error::{OmniError, OmniResult};
use crate::types::{Chunk, ChunkKind, ContextualisedChunk, SourceLocation};

/// A chat-completion provider; the contextualiser and translator both speak
/// this minimal interface so either can run behind the same HTTP client.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send `prompt`, return the raw completion text.
    async fn complete(&self, prompt: &str) -> OmniResult<String>;
}

struct LlmState {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_retries: u32,
}

/// HTTP-based chat-completion provider, gated through a [`CircuitBreaker`]
/// shared with whichever other provider callers the caller wires it to.
pub struct HttpLlmProvider {
    state: Arc<LlmState>,
    breaker: CircuitBreaker,
}

impl HttpLlmProvider {
    /// Build a provider from `config`. `OMNI_LLM_API_KEY` supplies
    /// credentials; the endpoint is derived from `config.provider`,
    /// overridable via `OMNI_LLM_ENDPOINT`.
    pub fn new(config: &LlmConfig, breaker: CircuitBreaker) -> Self {
        let endpoint = std::env::var("OMNI_LLM_ENDPOINT").unwrap_or_else(|_| match config.provider.as_str() {
            "openai" => "https://api.openai.com/v1/chat/completions".to_string(),
            "anthropic" => "https://api.anthropic.com/v1/messages".to_string(),
            other => format!("https://api.{other}.ai/v1/chat/completions"),
        });

        Self {
            state: Arc::new(LlmState {
                client: reqwest::Client::new(),
                endpoint,
                api_key: std::env::var("OMNI_LLM_API_KEY").ok(),
                model: config.model.clone(),
                max_retries: config.max_retries,
            }),
            breaker,
        }
    }
}

impl LlmState {
    async fn call_provider(&self, prompt: &str) -> OmniResult<String> {
        let mut attempt = 0;
        loop {
            let request = ChatRequest {
                model: &self.model,
                messages: &[ChatMessage { role: "user", content: prompt }],
            };

            let mut builder = self.client.post(&self.endpoint).json(&request);
            if let Some(api_key) = &self.api_key {
                builder = builder.bearer_auth(api_key);
            }

            let result = builder.send().await;
            let response = match result {
                Ok(r) => r,
                Err(_) if attempt < self.max_retries => {
                    attempt += 1;
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    continue;
                }
                Err(e) => return Err(OmniError::Http(e)),
            };

            if response.status().is_success() {
                let parsed: ChatResponse = response.json().await?;
                return Ok(parsed.choices.into_iter().next().map(|c| c.message.content).unwrap_or_default());
            }

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let info = ProviderErrorInfo {
                http_status: Some(status.as_u16()),
                message: body.clone(),
                ..Default::default()
            };

            if is_quota_error(&info) {
                return Err(OmniError::Quota {
                    provider: "llm".to_string(),
                    reason: body,
                });
            }

            if status.is_server_error() && attempt < self.max_retries {
                attempt += 1;
                tokio::time::sleep(backoff_delay(attempt)).await;
                continue;
            }

            return Err(OmniError::Provider {
                provider: "llm".to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(200 * 2u64.pow(attempt.min(5)))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage<'a>],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn complete(&self, prompt: &str) -> OmniResult<String> {
        let state = self.state.clone();
        let prompt = prompt.to_string();
        self.breaker
            .execute(move || {
                let state = state.clone();
                let prompt = prompt.clone();
                async move { state.call_provider(&prompt).await }
            })
            .await
    }
}

/// Per-chunk fast contextualiser: one LLM call per chunk, run concurrently.
/// Never fails: a chunk whose call errors is emitted with empty context.
pub async fn contextualise_per_chunk(
    provider: &dyn LlmProvider,
    file_content: &str,
    chunks: Vec<Chunk>,
) -> Vec<ContextualisedChunk> {
    let futures = chunks.into_iter().map(|chunk| async move {
        let prompt = per_chunk_prompt(file_content, &chunk);
        let context = provider
            .complete(&prompt)
            .await
            .map(|text| text.trim().to_string())
            .unwrap_or_default();
        ContextualisedChunk { chunk, context }
    });
    join_all(futures).await
}

fn per_chunk_prompt(file_content: &str, chunk: &Chunk) -> String {
    format!(
        "Given this file:\n\n{file_content}\n\nGive a short (2-4 sentence) retrieval context for this chunk, \
         describing what it does and where it sits in the file:\n\n{}",
        chunk.content
    )
}

/// Single-call mode: one LLM call contextualises the whole file at once via
/// a structured envelope, with one retry on a refined prompt before falling
/// back to a whole-file chunk with empty context.
pub async fn contextualise_whole_file(
    provider: &dyn LlmProvider,
    file_path: &Path,
    file_content: &str,
) -> Vec<ContextualisedChunk> {
    let prompt = whole_file_prompt(file_content);
    let first = provider.complete(&prompt).await;

    if let Ok(text) = &first {
        if let Some(chunks) = parse_envelope(text) {
            if !chunks.is_empty() {
                return chunks;
            }
        }
    }

    let refined = match &first {
        Ok(text) => refined_prompt(file_content, text),
        Err(_) => whole_file_prompt(file_content),
    };
    if let Ok(text) = provider.complete(&refined).await {
        if let Some(chunks) = parse_envelope(&text) {
            if !chunks.is_empty() {
                return chunks;
            }
        }
    }

    tracing::warn!(path = %file_path.display(), "contextualiser single-call mode failed twice, falling back to whole file");
    vec![ContextualisedChunk {
        chunk: Chunk {
            content: file_content.to_string(),
            location: SourceLocation::lines(1, file_content.lines().count().max(1) as u32),
            chunk_type: ChunkKind::File,
            metadata: Default::default(),
        },
        context: String::new(),
    }]
}

fn whole_file_prompt(file_content: &str) -> String {
    format!(
        "Split this file into semantically meaningful chunks and give each a short retrieval context. \
         Respond with one <chunk:contextualised> block per chunk, each containing <startLine>, <endLine>, \
         <chunkType>, <context>, and <content> tags.\n\nFile:\n\n{file_content}"
    )
}

fn refined_prompt(file_content: &str, previous_response: &str) -> String {
    format!(
        "Your previous response could not be parsed:\n\n{previous_response}\n\n\
         Respond again, strictly as a sequence of <chunk:contextualised> blocks, each with exactly one \
         <startLine>, <endLine>, <chunkType>, <context>, and <content> tag, no other text.\n\nFile:\n\n{file_content}"
    )
}

/// Parse the `<chunk:contextualised>` envelope; `None` means the response
/// didn't look like the envelope at all (vs. `Some(vec![])` for "well-formed
/// but empty", which the caller also treats as a failure).
fn parse_envelope(text: &str) -> Option<Vec<ContextualisedChunk>> {
    if !text.contains("<chunk:contextualised>") {
        return None;
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("<chunk:contextualised>") {
        let after_open = &rest[start + "<chunk:contextualised>".len()..];
        let Some(end) = after_open.find("</chunk:contextualised>") else {
            break;
        };
        let block = &after_open[..end];
        rest = &after_open[end + "</chunk:contextualised>".len()..];

        let start_line = extract_tag(block, "startLine").and_then(|s| s.trim().parse::<u32>().ok());
        let end_line = extract_tag(block, "endLine").and_then(|s| s.trim().parse::<u32>().ok());
        let chunk_type = extract_tag(block, "chunkType").map(|s| ChunkKind::from_str_lossy(s.trim()));
        let context = extract_tag(block, "context").unwrap_or_default().trim().to_string();
        let content = extract_tag(block, "content").unwrap_or_default();

        let (Some(start_line), Some(end_line)) = (start_line, end_line) else {
            continue;
        };

        chunks.push(ContextualisedChunk {
            chunk: Chunk {
                content: content.trim().to_string(),
                location: SourceLocation::lines(start_line, end_line),
                chunk_type: chunk_type.unwrap_or(ChunkKind::Block),
                metadata: Default::default(),
            },
            context,
        });
    }

    Some(chunks)
}

fn extract_tag<'a>(block: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = block.find(&open)? + open.len();
    let end = block[start..].find(&close)? + start;
    Some(&block[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn sample_chunk() -> Chunk {
        Chunk {
            content: "fn a() {}".to_string(),
            location: SourceLocation::lines(1, 1),
            chunk_type: ChunkKind::Function,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_per_chunk_empty_context_on_provider_error() {
        let provider = FakeProvider {
            responses: Mutex::new(vec![Err(OmniError::Internal("boom".to_string()))]),
        };
        let result = contextualise_per_chunk(&provider, "file", vec![sample_chunk()]).await;
        assert_eq!(result.len(), 1);
        assert!(result[0].context.is_empty());
    }

    #[tokio::test]
    async fn test_per_chunk_runs_all_and_preserves_order() {
        let provider = FakeProvider {
            responses: Mutex::new(vec![Ok("ctx one".to_string()), Ok("ctx two".to_string())]),
        };
        let chunks = vec![sample_chunk(), sample_chunk()];
        let result = contextualise_per_chunk(&provider, "file", chunks).await;
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_parse_envelope_extracts_fields() {
        let text = "<chunk:contextualised><startLine>1</startLine><endLine>3</endLine>\
                    <chunkType>function</chunkType><context>does a thing</context>\
                    <content>fn a() {}</content></chunk:contextualised>";
        let chunks = parse_envelope(text).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk.location.start_line, 1);
        assert_eq!(chunks[0].context, "does a thing");
    }

    #[test]
    fn test_parse_envelope_returns_none_for_non_envelope_text() {
        assert!(parse_envelope("just some prose").is_none());
    }

    #[test]
    fn test_parse_envelope_handles_multiple_blocks() {
        let text = "<chunk:contextualised><startLine>1</startLine><endLine>2</endLine>\
                    <chunkType>function</chunkType><context>a</context><content>x</content></chunk:contextualised>\
                    <chunk:contextualised><startLine>3</startLine><endLine>4</endLine>\
                    <chunkType>class</chunkType><context>b</context><content>y</content></chunk:contextualised>";
        let chunks = parse_envelope(text).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].chunk.chunk_type, ChunkKind::Class);
    }

    #[tokio::test]
    async fn test_whole_file_falls_back_after_two_parse_failures() {
        let provider = FakeProvider {
            responses: Mutex::new(vec![Ok("not xml".to_string()), Ok("still not xml".to_string())]),
        };
        let result = contextualise_whole_file(&provider, Path::new("a.rs"), "fn a() {}").await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].chunk.chunk_type, ChunkKind::File);
        assert!(result[0].context.is_empty());
    }

    #[tokio::test]
    async fn test_whole_file_succeeds_on_refined_retry() {
        let envelope = "<chunk:contextualised><startLine>1</startLine><endLine>1</endLine>\
                         <chunkType>function</chunkType><context>ctx</context><content>fn a() {}</content>\
                         </chunk:contextualised>";
        let provider = FakeProvider {
            responses: Mutex::new(vec![Ok("garbage".to_string()), Ok(envelope.to_string())]),
        };
        let result = contextualise_whole_file(&provider, Path::new("a.rs"), "fn a() {}").await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].context, "ctx");
    }
}
