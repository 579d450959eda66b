//! Reranking stage (C9): a second-pass relevance scorer over the fused
//! search result set, behind a pluggable HTTP provider.
//!
//! Reranking is a quality refinement, not a correctness requirement: on
//! provider failure or timeout the caller degrades to simply truncating the
//! existing RRF-ranked list to `top_k`, rather than failing the query.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::breaker::{is_quota_error, CircuitBreaker, ProviderErrorInfo};
use crate::config::RerankingConfig;
use crate::error::{OmniError, OmniResult};
use crate::types::SearchResult;

/// Second-stage relevance scorer over an already-fused result set.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score `results` against `query`, keep the top `top_k`, and populate
    /// `metadata.original_score` / `metadata.reranking_score` on survivors.
    /// Must never fail the overall search: on provider error, degrade to
    /// truncating the input order.
    async fn rerank(&self, query: &str, results: Vec<SearchResult>, top_k: usize) -> OmniResult<Vec<SearchResult>>;
}

/// HTTP cross-encoder reranker (Cohere-style `/rerank` endpoint).
pub struct HttpReranker {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    breaker: CircuitBreaker,
}

impl HttpReranker {
    /// Build a reranker from `config`. `api_key` is read from
    /// `OMNI_RERANKER_API_KEY` so it never has to live in a config file.
    pub fn new(config: &RerankingConfig, breaker: CircuitBreaker) -> Self {
        let endpoint = match config.provider.as_str() {
            "cohere" => "https://api.cohere.com/v1/rerank".to_string(),
            other => format!("https://api.{other}.ai/v1/rerank"),
        };
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: std::env::var("OMNI_RERANKER_API_KEY").ok(),
            model: config.model.clone(),
            breaker,
        }
    }

}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankRankedResult>,
}

#[derive(Deserialize)]
struct RerankRankedResult {
    index: usize,
    relevance_score: f64,
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, results: Vec<SearchResult>, top_k: usize) -> OmniResult<Vec<SearchResult>> {
        if results.is_empty() {
            return Ok(results);
        }

        let documents: Vec<String> = results
            .iter()
            .map(|r| {
                let mut text = r.document.original_code.clone();
                if let Some(context) = &r.document.context {
                    text = format!("{context}\n\n{text}");
                }
                text
            })
            .collect();

        let query = query.to_string();
        let outcome = {
            let documents = documents.clone();
            let client = self.client.clone();
            let endpoint = self.endpoint.clone();
            let api_key = self.api_key.clone();
            let model = self.model.clone();
            self.breaker
                .execute(move || {
                    let documents = documents.clone();
                    let client = client.clone();
                    let endpoint = endpoint.clone();
                    let api_key = api_key.clone();
                    let model = model.clone();
                    let query = query.clone();
                    async move { call_provider_owned(&client, &endpoint, api_key.as_deref(), &model, &query, &documents).await }
                })
                .await
        };

        let ranked = match outcome {
            Ok(ranked) => ranked,
            Err(e) => {
                tracing::warn!(error = %e, "reranker unavailable, falling back to truncation");
                return Ok(truncate(results, top_k));
            }
        };

        let mut reranked: Vec<SearchResult> = Vec::with_capacity(ranked.len());
        for entry in ranked {
            let Some(mut result) = results.get(entry.index).cloned() else {
                continue;
            };
            result
                .document
                .metadata
                .insert("original_score".to_string(), serde_json::json!(result.score));
            result
                .document
                .metadata
                .insert("reranking_score".to_string(), serde_json::json!(entry.relevance_score));
            result.score = entry.relevance_score;
            reranked.push(result);
        }

        reranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        reranked.truncate(top_k);
        Ok(reranked)
    }
}

async fn call_provider_owned(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: Option<&str>,
    model: &str,
    query: &str,
    documents: &[String],
) -> OmniResult<Vec<RerankRankedResult>> {
    let request = RerankRequest {
        model,
        query,
        documents,
        top_n: documents.len(),
    };

    let mut builder = client.post(endpoint).json(&request);
    if let Some(api_key) = api_key {
        builder = builder.bearer_auth(api_key);
    }

    let response = builder.send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let info = ProviderErrorInfo {
            http_status: Some(status.as_u16()),
            message: body.clone(),
            ..Default::default()
        };
        return Err(if is_quota_error(&info) {
            OmniError::Quota {
                provider: "reranker".to_string(),
                reason: body,
            }
        } else {
            OmniError::Provider {
                provider: "reranker".to_string(),
                message: format!("HTTP {status}: {body}"),
            }
        });
    }

    let parsed: RerankResponse = response.json().await?;
    Ok(parsed.results)
}

/// Degrade-to-truncate: keep the input's existing order, just cut to `top_k`.
fn truncate(mut results: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult> {
    results.truncate(top_k);
    results
}

/// A reranker that always degrades to truncation; used when reranking is
/// disabled in config, so callers don't need to special-case `None`.
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    async fn rerank(&self, _query: &str, results: Vec<SearchResult>, top_k: usize) -> OmniResult<Vec<SearchResult>> {
        Ok(truncate(results, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Language, SearchDocument};
    use std::path::PathBuf;

    fn sample_result(id: &str, score: f64) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            score,
            document: SearchDocument {
                file_path: PathBuf::from("a.rs"),
                function_name: None,
                class_name: None,
                start_line: 1,
                end_line: 5,
                language: Language::Rust,
                natural_language_description: None,
                original_code: "fn a() {}".to_string(),
                context: None,
                metadata: Default::default(),
            },
        }
    }

    #[tokio::test]
    async fn test_noop_reranker_truncates_to_top_k() {
        let reranker = NoopReranker;
        let results = vec![sample_result("a", 1.0), sample_result("b", 0.5), sample_result("c", 0.2)];
        let reranked = reranker.rerank("query", results, 2).await.unwrap();
        assert_eq!(reranked.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_input_short_circuits() {
        let reranker = NoopReranker;
        let reranked = reranker.rerank("query", Vec::new(), 10).await.unwrap();
        assert!(reranked.is_empty());
    }
}
