//! Pipeline orchestrator (C10): wires C1-C9 together into `index_repository`,
//! `index_repository_batch`, and `search`.
//!
//! [`Engine`] owns one instance of every adapter (store, embedder, LLM
//! provider, reranker) plus the [`CircuitBreaker`] they share, and exposes
//! the thin outward surface the CLI (and any other embedder of this crate)
//! drives.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::breaker::CircuitBreaker;
use crate::config::{ChunkStrategy, Config};
use crate::contextualiser::{self, HttpLlmProvider, LlmProvider};
use crate::embedder::{self, EmbeddingProvider, HttpEmbedder};
use crate::error::OmniResult;
use crate::merkle;
use crate::reranker::{HttpReranker, NoopReranker, Reranker};
use crate::store::{self, StoreStats, VectorStore};
use crate::translator;
use crate::types::{Chunk, ChunkLike, ContextualisedChunk, EmbeddedChunk, FileInfo, Language, PipelineChunk, SearchResult};

const RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// A point-in-time progress notification emitted during indexing.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A file's content has been loaded and is about to be chunked.
    Loading {
        /// Path relative to the repository root.
        path: PathBuf,
    },
    /// A file's chunks have been embedded and are being upserted.
    Indexing {
        /// Path relative to the repository root.
        path: PathBuf,
        /// Number of chunks produced for this file.
        chunk_count: usize,
    },
}

/// Caller-supplied progress callback; must be cheap and non-blocking.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Outcome of an `index_repository`/`index_repository_batch` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    /// Files successfully indexed.
    pub files_indexed: usize,
    /// Files that failed to index; the run continued past each one.
    pub failed_files: Vec<PathBuf>,
    /// Chunks that failed to embed. The file they belonged to may still have
    /// succeeded if at least one other chunk embedded.
    pub failed_chunks: usize,
    /// Total chunks upserted into the store.
    pub chunks_indexed: usize,
    /// Files deleted from the store because they no longer exist (incremental only).
    pub files_deleted: usize,
}

/// One line of the batch checkpoint journal (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchState {
    /// Path relative to the repository root.
    pub file_path: PathBuf,
    /// `"success"` or `"failure"`.
    pub status: String,
    /// ISO-8601 timestamp of the attempt.
    pub at: String,
}

/// Options for `index_repository`.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Restrict indexing to a sub-directory of the repository.
    pub sub_folder: Option<PathBuf>,
    /// Use C6 change detection instead of a full listing.
    pub incremental: bool,
    /// Rebuild the engine from this config before running; when absent, the
    /// engine keeps running with whatever config it was constructed with.
    pub config: Option<Config>,
}

/// Options for `index_repository_batch`.
pub struct BatchOptions {
    /// Where to read/write the JSONL checkpoint.
    pub state_file_path: PathBuf,
    /// Bounded parallelism for per-file work.
    pub concurrency: usize,
    /// Keep going past a file-level failure instead of aborting the run.
    pub continue_on_error: bool,
    /// Rebuild the engine from this config before running; when absent, the
    /// engine keeps running with whatever config it was constructed with.
    pub config: Option<Config>,
}

/// Options for `search`.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Cap on returned results; defaults to `config.search.default_max_results`.
    pub max_results: Option<usize>,
    /// Keep only results whose file path contains this substring.
    pub file_filter: Option<String>,
    /// Keep only results in this language.
    pub language_filter: Option<Language>,
    /// Override `config.search.hybrid_search`.
    pub hybrid_search: Option<bool>,
    /// Override `config.search.reranking.enabled`.
    pub reranking: Option<bool>,
}

/// Owns one adapter instance per subsystem and exposes the orchestrator's
/// thin outward surface (§6): `index`, `index_batch`, `search`, `purge_all`,
/// `stats`.
pub struct Engine {
    config: Config,
    store: Box<dyn VectorStore>,
    embedder: Box<dyn EmbeddingProvider>,
    llm: Box<dyn LlmProvider>,
    reranker: Box<dyn Reranker>,
    breaker: CircuitBreaker,
}

impl Engine {
    /// Build an engine for `repo_root`, resolving config the same way
    /// `index_repository` does when no explicit config is passed.
    pub fn new(repo_root: &Path) -> OmniResult<Self> {
        let config = Config::load(repo_root, None)?;
        Self::with_config(config)
    }

    /// Build an engine from an already-resolved config.
    pub fn with_config(config: Config) -> OmniResult<Self> {
        let breaker = CircuitBreaker::with_defaults(RETRY_INTERVAL);
        let store = store::build_store(&config)?;
        let embedder: Box<dyn EmbeddingProvider> = Box::new(HttpEmbedder::new(&config.embedding, breaker.clone()));
        let llm: Box<dyn LlmProvider> = Box::new(HttpLlmProvider::new(&config.llm, breaker.clone()));
        let reranker: Box<dyn Reranker> = if config.search.reranking.enabled {
            Box::new(HttpReranker::new(&config.search.reranking, breaker.clone()))
        } else {
            Box::new(NoopReranker)
        };

        Ok(Self {
            config,
            store,
            embedder,
            llm,
            reranker,
            breaker,
        })
    }

    /// Rebuild every derived component in place from `config`, discarding the
    /// cached reranker (step 2 of §4.10).
    fn rebuild_from(&mut self, config: Config) -> OmniResult<()> {
        let store = store::build_store(&config)?;
        let embedder: Box<dyn EmbeddingProvider> = Box::new(HttpEmbedder::new(&config.embedding, self.breaker.clone()));
        let llm: Box<dyn LlmProvider> = Box::new(HttpLlmProvider::new(&config.llm, self.breaker.clone()));
        let reranker: Box<dyn Reranker> = if config.search.reranking.enabled {
            Box::new(HttpReranker::new(&config.search.reranking, self.breaker.clone()))
        } else {
            Box::new(NoopReranker)
        };

        self.store = store;
        self.embedder = embedder;
        self.llm = llm;
        self.reranker = reranker;
        self.config = config;
        Ok(())
    }

    /// The effective config this engine is currently running with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `orchestrator.index(repo, opts)` (§6).
    pub async fn index_repository(
        &mut self,
        repo_root: &Path,
        options: IndexOptions,
        on_progress: Option<ProgressCallback>,
    ) -> OmniResult<IndexStats> {
        if let Some(config) = options.config {
            self.rebuild_from(config)?;
        }
        self.store.initialize().await?;

        let mut stats = IndexStats::default();
        let file_set: Vec<PathBuf> = if options.incremental {
            let changes = merkle::detect_changes(repo_root, &self.config)?;
            for deleted in &changes.deleted {
                if self.store.delete_by_file_path(deleted).await.is_ok() {
                    stats.files_deleted += 1;
                }
            }
            changes.added.into_iter().chain(changes.modified).collect()
        } else {
            crate::loader::list_files(repo_root, options.sub_folder.as_deref(), &self.config)?
        };

        self.index_files(repo_root, &file_set, &on_progress, &mut stats).await;

        merkle::save_snapshot(repo_root, &self.config)?;
        self.config.indexed = true;
        Ok(stats)
    }

    /// `orchestrator.index_batch(repo, opts)` (§6). Checkpoints progress to
    /// `options.state_file_path` so a crashed run can resume without
    /// re-processing already-successful files.
    pub async fn index_repository_batch(
        &mut self,
        repo_root: &Path,
        options: BatchOptions,
        on_progress: Option<ProgressCallback>,
    ) -> OmniResult<IndexStats> {
        if let Some(config) = options.config {
            self.rebuild_from(config)?;
        }
        self.store.initialize().await?;

        let already_done = load_checkpoint(&options.state_file_path);
        let all_files = crate::loader::list_files(repo_root, None, &self.config)?;
        let pending: Vec<PathBuf> = all_files.into_iter().filter(|f| !already_done.contains(f)).collect();

        let mut stats = IndexStats::default();
        for batch in pending.chunks(options.concurrency.max(1)) {
            for path in batch {
                if let Some(cb) = &on_progress {
                    cb(ProgressEvent::Loading { path: path.clone() });
                }

                match self.process_file(repo_root, path, &on_progress).await {
                    Ok(chunk_count) => {
                        stats.files_indexed += 1;
                        stats.chunks_indexed += chunk_count;
                        append_checkpoint(&options.state_file_path, path, "success")?;
                    }
                    Err(e) => {
                        stats.failed_files.push(path.clone());
                        append_checkpoint(&options.state_file_path, path, "failure")?;
                        if !options.continue_on_error {
                            return Err(e);
                        }
                        tracing::warn!(path = %path.display(), error = %e, "file indexing failed, continuing");
                    }
                }
            }
        }

        merkle::save_snapshot(repo_root, &self.config)?;
        self.config.indexed = true;
        Ok(stats)
    }

    /// Process `file_set` with bounded parallelism (`FILE_PROCESSING_PARALLEL_BATCH_SIZE`).
    async fn index_files(
        &self,
        repo_root: &Path,
        file_set: &[PathBuf],
        on_progress: &Option<ProgressCallback>,
        stats: &mut IndexStats,
    ) {
        let concurrency = crate::config::DEFAULT_PARALLEL_BATCH_SIZE;
        for batch in file_set.chunks(concurrency) {
            let results = futures_util::future::join_all(batch.iter().map(|path| async move {
                if let Some(cb) = on_progress {
                    cb(ProgressEvent::Loading { path: path.clone() });
                }
                (path.clone(), self.process_file(repo_root, path, on_progress).await)
            }))
            .await;

            for (path, result) in results {
                match result {
                    Ok(chunk_count) => {
                        stats.files_indexed += 1;
                        stats.chunks_indexed += chunk_count;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "file indexing failed");
                        stats.failed_files.push(path);
                    }
                }
            }
        }
    }

    /// Load, chunk, contextualise, translate, embed, and upsert one file.
    /// Returns the number of chunks upserted.
    async fn process_file(
        &self,
        repo_root: &Path,
        relative_path: &Path,
        on_progress: &Option<ProgressCallback>,
    ) -> OmniResult<usize> {
        let file = crate::loader::load(repo_root, relative_path)?;
        if file.size > self.config.max_file_size {
            return Ok(0);
        }

        let contextualised = self.contextualise_file(&file).await;
        if contextualised.is_empty() {
            return Ok(0);
        }

        let translations = if self.config.chunking.dual_embedding {
            let raw_chunks: Vec<Chunk> = contextualised.iter().map(|c| c.chunk.clone()).collect();
            Some(translator::translate_batch(self.llm.as_ref(), &raw_chunks, &file).await)
        } else {
            None
        };

        let pipeline_chunks: Vec<PipelineChunk> = contextualised.into_iter().map(PipelineChunk::Contextualised).collect();

        let embedded = self.embed_chunks(&file, pipeline_chunks, translations).await;
        if embedded.is_empty() {
            return Ok(0);
        }

        let chunk_count = embedded.len();
        if let Some(cb) = on_progress {
            cb(ProgressEvent::Indexing {
                path: relative_path.to_path_buf(),
                chunk_count,
            });
        }

        const UPSERT_BATCH: usize = 100;
        for batch in embedded.chunks(UPSERT_BATCH) {
            self.store.index_chunks(batch).await?;
        }

        Ok(chunk_count)
    }

    async fn contextualise_file(&self, file: &FileInfo) -> Vec<ContextualisedChunk> {
        if self.config.chunking.contextual_chunking && self.config.chunking.strategy == ChunkStrategy::Llm {
            return contextualiser::contextualise_whole_file(self.llm.as_ref(), &file.relative_path, &file.content).await;
        }

        let chunks = crate::chunker::chunk_file(&file.relative_path, &file.content, file.language, &self.config);
        if self.config.chunking.contextual_chunking {
            contextualiser::contextualise_per_chunk(self.llm.as_ref(), &file.content, chunks).await
        } else {
            chunks
                .into_iter()
                .map(|chunk| ContextualisedChunk { chunk, context: String::new() })
                .collect()
        }
    }

    /// Embed each chunk's contextualised text (primary) and, when dual
    /// embedding is on, its translated description (secondary). A chunk
    /// whose embedding call fails is dropped rather than poisoning the file.
    async fn embed_chunks(
        &self,
        file: &FileInfo,
        chunks: Vec<PipelineChunk>,
        translations: Option<Vec<String>>,
    ) -> Vec<EmbeddedChunk> {
        let futures = chunks.into_iter().enumerate().map(|(index, chunk)| {
            let natural_language = translations.as_ref().map(|t| t[index].clone());
            async move {
                let primary_text = chunk.embedding_text();
                match embedder::embed_dual(self.embedder.as_ref(), &primary_text, natural_language.as_deref()).await {
                    Ok(dual) => Some(EmbeddedChunk {
                        file_path: file.relative_path.clone(),
                        language: file.language,
                        chunk,
                        embedding: dual.code,
                        secondary_embedding: dual.natural_language,
                        natural_language_description: natural_language,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            path = %file.relative_path.display(),
                            error = %e,
                            "chunk embedding failed, dropping chunk"
                        );
                        None
                    }
                }
            }
        });

        futures_util::future::join_all(futures).await.into_iter().flatten().collect()
    }

    /// `orchestrator.search(query, opts)` (§6).
    pub async fn search(&self, query: &str, options: SearchOptions) -> OmniResult<Vec<SearchResult>> {
        let max_results = options.max_results.unwrap_or(self.config.search.default_max_results);
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let reranking = options.reranking.unwrap_or(self.config.search.reranking.enabled);

        // Neither store shape can embed a query on its own (§4.8); the
        // orchestrator always computes it before calling store.search.
        let query_embedding = self.embedder.embed(query, embedder::TaskType::CodeRetrievalQuery).await?;

        let search_limit = if reranking {
            max_results.saturating_mul(2).max(self.config.search.reranking.top_k)
        } else {
            max_results
        };

        let mut results = self.store.search(query, Some(&query_embedding), search_limit).await?;

        if let Some(filter) = &options.file_filter {
            results.retain(|r| r.document.file_path.to_string_lossy().contains(filter.as_str()));
        }
        if let Some(language) = options.language_filter {
            results.retain(|r| r.document.language == language);
        }

        if reranking {
            results = self.reranker.rerank(query, results, max_results).await?;
        } else {
            results.truncate(max_results);
        }

        Ok(results)
    }

    /// `orchestrator.purge_all()` (§6). Also drops the Merkle snapshot: a
    /// purged store with a stale snapshot would make the next incremental
    /// run see zero changes and skip reindexing everything.
    pub async fn purge_all(&self) -> OmniResult<()> {
        self.store.purge().await?;
        merkle::delete_snapshot(&self.config.repo_path)?;
        Ok(())
    }

    /// `orchestrator.stats()` (§6).
    pub async fn stats(&self) -> OmniResult<StoreStats> {
        self.store.stats().await
    }
}

fn load_checkpoint(path: &Path) -> std::collections::HashSet<PathBuf> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return Default::default();
    };
    text.lines()
        .filter_map(|line| serde_json::from_str::<BatchState>(line).ok())
        .filter(|state| state.status == "success")
        .map(|state| state.file_path)
        .collect()
}

fn append_checkpoint(path: &Path, file_path: &Path, status: &str) -> OmniResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let state = BatchState {
        file_path: file_path.to_path_buf(),
        status: status.to_string(),
        at: chrono::Utc::now().to_rfc3339(),
    };
    let line = serde_json::to_string(&state).map_err(|e| crate::error::OmniError::Serialization(e.to_string()))?;
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}").map_err(crate::error::OmniError::Io)?;
    Ok(())
}
