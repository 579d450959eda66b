//! Vector-store adapters (C8): a pluggable interface with two concrete
//! shapes — an embedded SQL store with hybrid (vector + lexical) search, and
//! a managed document-store search service.

pub mod managed;
pub mod sql;

use std::path::Path;

use async_trait::async_trait;

use crate::config::{BackendConfig, Config};
use crate::error::OmniResult;
use crate::types::{EmbeddedChunk, SearchResult};

/// Aggregate statistics for a store partition.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    /// Number of distinct source files represented in the store.
    pub total_documents: u64,
    /// Number of chunks (rows/documents) in the store.
    pub total_chunks: u64,
    /// On-disk size in bytes, when the backend can report it.
    pub storage_size: Option<u64>,
}

/// Shared contract both store shapes implement (§4.8).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent setup: create schema/collection if missing.
    async fn initialize(&self) -> OmniResult<()>;

    /// Batched upsert, keyed by the deterministic chunk id (§3).
    async fn index_chunks(&self, chunks: &[EmbeddedChunk]) -> OmniResult<()>;

    /// Delete every chunk belonging to `path` in the current partition.
    async fn delete_by_file_path(&self, path: &Path) -> OmniResult<()>;

    /// Hybrid or pure-vector search, depending on `query_embedding` and
    /// whether the backend supports lexical fusion.
    async fn search(
        &self,
        query_text: &str,
        query_embedding: Option<&[f32]>,
        max_results: usize,
    ) -> OmniResult<Vec<SearchResult>>;

    /// Delete every chunk in the current partition.
    async fn purge(&self) -> OmniResult<()>;

    /// Aggregate statistics for the current partition.
    async fn stats(&self) -> OmniResult<StoreStats>;
}

/// Instantiate the store shape named by `config.backend`.
pub fn build_store(config: &Config) -> OmniResult<Box<dyn VectorStore>> {
    match &config.backend {
        BackendConfig::Sql(sql_config) => Ok(Box::new(sql::SqlStore::new(config, sql_config)?)),
        BackendConfig::Managed(managed_config) => {
            Ok(Box::new(managed::ManagedStore::new(config, managed_config)?))
        }
    }
}

/// Partition key used to scope every query to `config.name`, defaulting to
/// an empty string when the repository has no named config.
pub fn partition_name(config: &Config) -> String {
    config.name.clone().unwrap_or_default()
}
