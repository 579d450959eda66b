//! HTTP embedding provider (C5): text → fixed-dimension vectors.
//!
//! Paced by a sliding-window per-minute token budget and retried with
//! exponential backoff, gated through the shared [`CircuitBreaker`] so a
//! sustained quota error opens the breaker for every other caller sharing
//! it (contextualiser, translator, reranker).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::breaker::{is_quota_error, CircuitBreaker, ProviderErrorInfo};
use crate::config::EmbeddingConfig;
use crate::error::{OmniError, OmniResult};

/// What the embedding is being computed for; some providers tune the vector
/// differently per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// A document chunk being indexed.
    RetrievalDocument,
    /// A natural-language search query.
    RetrievalQuery,
    /// A search query being matched against code (used for dual embedding).
    CodeRetrievalQuery,
}

impl TaskType {
    fn as_str(self) -> &'static str {
        match self {
            Self::RetrievalDocument => "retrieval_document",
            Self::RetrievalQuery => "retrieval_query",
            Self::CodeRetrievalQuery => "code_retrieval_query",
        }
    }
}

/// Two embeddings produced for one chunk: code (primary) and, when dual
/// embedding is on, a natural-language translation (secondary).
#[derive(Debug, Clone)]
pub struct DualEmbedding {
    /// Embedding of the code / contextualised content.
    pub code: Vec<f32>,
    /// Embedding of the natural-language translation, when dual embedding is on.
    pub natural_language: Option<Vec<f32>>,
}

/// Embedding provider contract (§4.5).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text for the given task type.
    async fn embed(&self, text: &str, task_type: TaskType) -> OmniResult<Vec<f32>>;

    /// Embed a batch of texts, same-order results.
    async fn embed_batch(&self, texts: &[String], task_type: TaskType) -> OmniResult<Vec<Vec<f32>>>;

    /// Embedding dimensionality.
    fn dimension(&self) -> u32;

    /// Model identifier.
    fn model(&self) -> &str;
}

/// Sliding-window per-minute token budget. Blocks `acquire` until admitting
/// `tokens` would keep the trailing 60-second sum under `quota_per_minute`.
struct RateLimiter {
    quota_per_minute: u64,
    window: Mutex<VecDeque<(Instant, u64)>>,
}

impl RateLimiter {
    fn new(quota_per_minute: u64) -> Self {
        Self {
            quota_per_minute,
            window: Mutex::new(VecDeque::new()),
        }
    }

    async fn acquire(&self, tokens: u64) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                while window.front().is_some_and(|(t, _)| now.duration_since(*t) > Duration::from_secs(60)) {
                    window.pop_front();
                }

                let used: u64 = window.iter().map(|(_, n)| n).sum();
                if used + tokens <= self.quota_per_minute {
                    window.push_back((now, tokens));
                    None
                } else {
                    let oldest = window.front().map(|(t, _)| *t).unwrap_or(now);
                    let age = now.duration_since(oldest);
                    Some(Duration::from_secs(60).saturating_sub(age) + Duration::from_millis(50))
                }
            };

            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}

/// Rough token estimate: ~4 characters per token, matching common
/// byte-pair-encoding tokenizers closely enough for rate-limit pacing.
fn estimate_tokens(text: &str) -> u64 {
    ((text.len() as u64) / 4).max(1)
}

/// Fields shared behind an `Arc` so the rate limiter's window state and the
/// HTTP client survive across retries and circuit-breaker re-invocations of
/// the same logical call.
struct EmbedderState {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimensions: u32,
    limiter: RateLimiter,
    max_retries: u32,
}

/// HTTP-based embedding provider (OpenAI-compatible `/embeddings` endpoint
/// by default; other providers speak a close variant of the same contract).
pub struct HttpEmbedder {
    state: std::sync::Arc<EmbedderState>,
    breaker: CircuitBreaker,
}

impl HttpEmbedder {
    /// Build a provider from `config`. `OMNI_EMBEDDING_API_KEY` supplies
    /// credentials; provider-specific endpoints are derived from
    /// `config.provider`, overridable via `OMNI_EMBEDDING_ENDPOINT`.
    pub fn new(config: &EmbeddingConfig, breaker: CircuitBreaker) -> Self {
        let endpoint = std::env::var("OMNI_EMBEDDING_ENDPOINT").unwrap_or_else(|_| match config.provider.as_str() {
            "openai" => "https://api.openai.com/v1/embeddings".to_string(),
            "voyage" => "https://api.voyageai.com/v1/embeddings".to_string(),
            other => format!("https://api.{other}.ai/v1/embeddings"),
        });

        Self {
            state: std::sync::Arc::new(EmbedderState {
                client: reqwest::Client::new(),
                endpoint,
                api_key: std::env::var("OMNI_EMBEDDING_API_KEY").ok(),
                model: config.model.clone(),
                dimensions: config.dimensions,
                limiter: RateLimiter::new(config.tokens_per_minute),
                max_retries: 3,
            }),
            breaker,
        }
    }
}

impl EmbedderState {
    async fn call_provider(&self, texts: &[String], task_type: TaskType) -> OmniResult<Vec<Vec<f32>>> {
        let tokens: u64 = texts.iter().map(|t| estimate_tokens(t)).sum();
        self.limiter.acquire(tokens).await;

        let mut attempt = 0;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: texts,
                task_type: task_type.as_str(),
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
                let parsed: EmbeddingResponse = response.json().await?;
                return Ok(parsed.data.into_iter().map(|d| d.embedding).collect());
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
                    provider: "embedder".to_string(),
                    reason: body,
                });
            }

            if status.is_server_error() && attempt < self.max_retries {
                attempt += 1;
                tokio::time::sleep(backoff_delay(attempt)).await;
                continue;
            }

            return Err(OmniError::Provider {
                provider: "embedder".to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(200 * 2u64.pow(attempt.min(5)))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    task_type: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, text: &str, task_type: TaskType) -> OmniResult<Vec<f32>> {
        let mut vectors = self.embed_batch(std::slice::from_ref(&text.to_string()), task_type).await?;
        vectors.pop().ok_or_else(|| OmniError::Provider {
            provider: "embedder".to_string(),
            message: "empty embedding response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String], task_type: TaskType) -> OmniResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let state = self.state.clone();
        let texts = texts.to_vec();
        self.breaker
            .execute(move || {
                let state = state.clone();
                let texts = texts.clone();
                async move { state.call_provider(&texts, task_type).await }
            })
            .await
    }

    fn dimension(&self) -> u32 {
        self.state.dimensions
    }

    fn model(&self) -> &str {
        &self.state.model
    }
}

/// `embed(code, code_retrieval_query)` and, when `natural_language` is
/// `Some`, `embed(text, retrieval_document)` concurrently.
pub async fn embed_dual(
    embedder: &dyn EmbeddingProvider,
    code: &str,
    natural_language: Option<&str>,
) -> OmniResult<DualEmbedding> {
    match natural_language {
        None => Ok(DualEmbedding {
            code: embedder.embed(code, TaskType::CodeRetrievalQuery).await?,
            natural_language: None,
        }),
        Some(text) => {
            let (code_result, nl_result) = tokio::join!(
                embedder.embed(code, TaskType::CodeRetrievalQuery),
                embedder.embed(text, TaskType::RetrievalDocument)
            );
            Ok(DualEmbedding {
                code: code_result?,
                natural_language: Some(nl_result?),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_never_zero_for_nonempty_text() {
        assert!(estimate_tokens("a") >= 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn test_backoff_delay_grows_with_attempt() {
        assert!(backoff_delay(2) > backoff_delay(1));
        assert!(backoff_delay(10) <= Duration::from_millis(200 * 64));
    }

    #[tokio::test]
    async fn test_rate_limiter_admits_under_quota_without_waiting() {
        let limiter = RateLimiter::new(1000);
        let start = Instant::now();
        limiter.acquire(10).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
