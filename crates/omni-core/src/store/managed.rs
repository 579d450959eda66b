//! Shape B: managed document-store search service (§4.8).
//!
//! Upserts documents with an embedding field plus filterable metadata over
//! HTTP. The remote service handles query expansion, spell correction, and
//! ranking itself, so there is no RRF stage here. `stats()` degrades to
//! zeros when the service doesn't expose counts, per the contract.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{StoreStats, VectorStore};
use crate::config::{Config, ManagedBackendConfig};
use crate::error::{OmniError, OmniResult};
use crate::types::{ChunkLike, EmbeddedChunk, SearchDocument, SearchResult};

/// HTTP-backed managed document-store adapter.
pub struct ManagedStore {
    client: reqwest::Client,
    endpoint: String,
    collection_id: String,
    partition: String,
    project_id: Option<String>,
}

impl ManagedStore {
    /// Build a client against `managed_config.endpoint` (or the provider's
    /// default when unset). Requires `collection_id` to be configured.
    pub fn new(config: &Config, managed_config: &ManagedBackendConfig) -> OmniResult<Self> {
        let collection_id = managed_config.collection_id.clone().ok_or_else(|| OmniError::Config {
            details: "managed backend requires collection_id".to_string(),
        })?;
        let endpoint = managed_config
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://discoveryengine.googleapis.com/v1".to_string());

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            collection_id,
            partition: super::partition_name(config),
            project_id: managed_config.project_id.clone(),
        })
    }

    fn documents_url(&self) -> String {
        format!("{}/collections/{}/documents", self.endpoint, self.collection_id)
    }
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    id: &'a str,
    #[serde(rename = "structData")]
    struct_data: serde_json::Value,
    embedding: &'a [f32],
}

#[derive(Deserialize)]
struct SearchResponseEnvelope {
    #[serde(default)]
    results: Vec<SearchResponseEntry>,
}

#[derive(Deserialize)]
struct SearchResponseEntry {
    id: String,
    #[serde(default)]
    score: f64,
    document: serde_json::Value,
}

#[async_trait]
impl VectorStore for ManagedStore {
    async fn initialize(&self) -> OmniResult<()> {
        // The collection is provisioned out-of-band by the provider; nothing
        // to create client-side beyond verifying credentials are present.
        tracing::debug!(
            collection = %self.collection_id,
            project = self.project_id.as_deref().unwrap_or("-"),
            "managed store ready"
        );
        Ok(())
    }

    async fn index_chunks(&self, chunks: &[EmbeddedChunk]) -> OmniResult<()> {
        for chunk in chunks {
            let location = chunk.chunk.location();
            let id = crate::types::chunk_id(&chunk.file_path, location.start_line, location.end_line);
            let metadata = chunk.chunk.metadata();

            let struct_data = json!({
                "name": self.partition,
                "filename": chunk.file_path.to_string_lossy(),
                "line_from": location.start_line,
                "line_to": location.end_line,
                "original_text": chunk.chunk.raw_content(),
                "contextualised_chunk": chunk.chunk.embedding_text(),
                "language": chunk.language.as_str(),
                "chunk_type": chunk.chunk.chunk_type().as_str(),
                "function_name": metadata.get("function_name"),
                "class_name": metadata.get("class_name"),
                "natural_language_description": chunk.natural_language_description,
            });

            let request = UpsertRequest {
                id: &id,
                struct_data,
                embedding: &chunk.embedding,
            };

            let response = self
                .client
                .patch(format!("{}/{}", self.documents_url(), id))
                .query(&[("allowMissing", "true")])
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(classify_response_error("managed-store", response).await);
            }
        }
        Ok(())
    }

    async fn delete_by_file_path(&self, path: &Path) -> OmniResult<()> {
        let response = self
            .client
            .post(format!("{}:purgeDocuments", self.documents_url()))
            .json(&json!({
                "filter": format!("name=\"{}\" AND filename=\"{}\"", self.partition, path.display()),
                "force": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_response_error("managed-store", response).await);
        }
        Ok(())
    }

    async fn search(
        &self,
        query_text: &str,
        query_embedding: Option<&[f32]>,
        max_results: usize,
    ) -> OmniResult<Vec<SearchResult>> {
        let body = json!({
            "query": query_text,
            "embedding": query_embedding,
            "filter": format!("name=\"{}\"", self.partition),
            "pageSize": max_results,
            "spellCorrectionSpec": { "mode": "AUTO" },
        });

        let response = self
            .client
            .post(format!("{}:search", self.documents_url()))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_response_error("managed-store", response).await);
        }

        let envelope: SearchResponseEnvelope = response.json().await?;
        Ok(envelope
            .results
            .into_iter()
            .map(|entry| SearchResult {
                id: entry.id,
                score: entry.score,
                document: document_from_struct_data(entry.document),
            })
            .collect())
    }

    async fn purge(&self) -> OmniResult<()> {
        let response = self
            .client
            .post(format!("{}:purgeDocuments", self.documents_url()))
            .json(&json!({ "filter": format!("name=\"{}\"", self.partition), "force": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_response_error("managed-store", response).await);
        }
        Ok(())
    }

    /// The managed API exposes no cheap count endpoint; report zeros rather
    /// than failing, per the contract.
    async fn stats(&self) -> OmniResult<StoreStats> {
        Ok(StoreStats::default())
    }
}

fn document_from_struct_data(value: serde_json::Value) -> SearchDocument {
    let get_str = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let get_u32 = |key: &str| value.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32;

    SearchDocument {
        file_path: get_str("filename").unwrap_or_default().into(),
        function_name: get_str("function_name"),
        class_name: get_str("class_name"),
        start_line: get_u32("line_from"),
        end_line: get_u32("line_to"),
        language: get_str("language")
            .map(|s| crate::types::Language::from_extension(&s))
            .unwrap_or(crate::types::Language::Unknown),
        natural_language_description: get_str("natural_language_description"),
        original_code: get_str("original_text").unwrap_or_default(),
        context: get_str("contextualised_chunk"),
        metadata: std::collections::HashMap::new(),
    }
}

async fn classify_response_error(provider: &str, response: reqwest::Response) -> OmniError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let info = crate::breaker::ProviderErrorInfo {
        http_status: Some(status.as_u16()),
        message: body.clone(),
        ..Default::default()
    };
    if crate::breaker::is_quota_error(&info) {
        OmniError::Quota {
            provider: provider.to_string(),
            reason: body,
        }
    } else {
        OmniError::Provider {
            provider: provider.to_string(),
            message: format!("HTTP {status}: {body}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_collection_id() {
        let config = Config::default();
        let managed = ManagedBackendConfig::default();
        let result = ManagedStore::new(&config, &managed);
        assert!(result.is_err());
    }

    #[test]
    fn test_new_succeeds_with_collection_id() {
        let config = Config::default();
        let managed = ManagedBackendConfig {
            collection_id: Some("default_collection".to_string()),
            ..Default::default()
        };
        assert!(ManagedStore::new(&config, &managed).is_ok());
    }

    #[test]
    fn test_document_from_struct_data_defaults_missing_fields() {
        let doc = document_from_struct_data(json!({ "filename": "a.rs" }));
        assert_eq!(doc.file_path, Path::new("a.rs"));
        assert_eq!(doc.start_line, 0);
        assert!(doc.function_name.is_none());
    }
}
