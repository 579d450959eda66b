//! Shape A: embedded SQL store with hybrid vector + lexical search (§4.8).
//!
//! Backed by `rusqlite` with the bundled SQLite, which ships FTS5. The ANN
//! side is approximated by a linear cosine scan over the partition's rows:
//! correct, and fast enough at the scale a single-repository index reaches,
//! without pulling in a standalone vector-index crate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tokio::sync::Mutex as AsyncMutex;

use super::{StoreStats, VectorStore};
use crate::config::{Config, SqlBackendConfig};
use crate::error::{OmniError, OmniResult};
use crate::search::SearchEngine;
use crate::types::{ChunkLike, EmbeddedChunk, Language, SearchDocument, SearchResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    filename TEXT NOT NULL,
    line_from INTEGER NOT NULL,
    line_to INTEGER NOT NULL,
    original_text TEXT NOT NULL,
    contextualised_chunk TEXT NOT NULL,
    embedding BLOB NOT NULL,
    code_embedding BLOB,
    language TEXT NOT NULL,
    chunk_type TEXT NOT NULL,
    function_name TEXT,
    class_name TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    full_text_search TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunks_name ON chunks(name);
CREATE INDEX IF NOT EXISTS idx_chunks_filename ON chunks(filename, name);
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(id UNINDEXED, name UNINDEXED, full_text_search);
";

/// A small fixed-size pool of `rusqlite` connections, round-robin acquired.
/// Bounded concurrency falls out of there being exactly `max_connections`
/// mutexes: a caller simply blocks on `.lock()` when all are busy.
struct ConnectionPool {
    connections: Vec<AsyncMutex<Connection>>,
    next: AtomicUsize,
}

impl ConnectionPool {
    fn open(path: &Path, size: u32) -> OmniResult<Self> {
        let size = size.max(1) as usize;
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open(path)?;
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
            conn.execute_batch(SCHEMA)?;
            connections.push(AsyncMutex::new(conn));
        }
        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    async fn acquire(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        self.connections[index].lock().await
    }
}

/// Embedded SQL + FTS5 vector store, one instance per repository index.
pub struct SqlStore {
    pool: Arc<ConnectionPool>,
    partition: String,
    rrf: SearchEngine,
    vector_weight: f64,
    hybrid_search: bool,
}

impl SqlStore {
    /// Open (creating if absent) the database at `sql_config.database`, under
    /// the repository's state directory when no explicit host is set.
    pub fn new(config: &Config, sql_config: &SqlBackendConfig) -> OmniResult<Self> {
        let path = match &sql_config.host {
            Some(host) => Path::new(host).to_path_buf(),
            None => Config::state_dir(&config.repo_path).join(&sql_config.database),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::open(&path, sql_config.max_connections)?;
        Ok(Self {
            pool: Arc::new(pool),
            partition: super::partition_name(config),
            rrf: SearchEngine::new(config.search.rrf_k),
            vector_weight: config.search.vector_weight,
            hybrid_search: config.search.hybrid_search,
        })
    }
}

fn vec_to_blob(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn blob_to_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

struct Row {
    id: String,
    filename: String,
    line_from: u32,
    line_to: u32,
    original_text: String,
    contextualised_chunk: String,
    embedding: Vec<f32>,
    language: String,
    chunk_type: String,
    function_name: Option<String>,
    class_name: Option<String>,
    metadata: String,
}

impl Row {
    fn into_document(self) -> SearchDocument {
        let metadata: HashMap<String, serde_json::Value> =
            serde_json::from_str(&self.metadata).unwrap_or_default();
        // `language` column stores the canonical name (Language::as_str), not an extension.
        let language = language_from_name(&self.language);

        SearchDocument {
            file_path: self.filename.into(),
            function_name: self.function_name,
            class_name: self.class_name,
            start_line: self.line_from,
            end_line: self.line_to,
            language,
            natural_language_description: None,
            original_code: self.original_text,
            context: if self.contextualised_chunk.is_empty() {
                None
            } else {
                Some(self.contextualised_chunk)
            },
            metadata,
        }
        .with_chunk_type(&self.chunk_type)
    }
}

impl SearchDocument {
    fn with_chunk_type(mut self, chunk_type: &str) -> Self {
        self.metadata
            .insert("chunk_type".to_string(), serde_json::Value::String(chunk_type.to_string()));
        self
    }
}

fn language_from_name(name: &str) -> Language {
    match name {
        "python" => Language::Python,
        "typescript" => Language::TypeScript,
        "javascript" => Language::JavaScript,
        "rust" => Language::Rust,
        "go" => Language::Go,
        "java" => Language::Java,
        "c" => Language::C,
        "cpp" => Language::Cpp,
        "csharp" => Language::CSharp,
        "css" => Language::Css,
        "ruby" => Language::Ruby,
        "php" => Language::Php,
        "swift" => Language::Swift,
        "kotlin" => Language::Kotlin,
        "html" => Language::Html,
        "shell" => Language::Shell,
        "markdown" => Language::Markdown,
        "toml" => Language::Toml,
        "yaml" => Language::Yaml,
        "json" => Language::Json,
        _ => Language::Unknown,
    }
}

#[async_trait]
impl VectorStore for SqlStore {
    async fn initialize(&self) -> OmniResult<()> {
        let conn = self.pool.acquire().await;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    async fn index_chunks(&self, chunks: &[EmbeddedChunk]) -> OmniResult<()> {
        const BATCH_SIZE: usize = 100;
        let partition = self.partition.clone();
        let conn = self.pool.acquire().await;
        let now = chrono::Utc::now().to_rfc3339();

        for batch in chunks.chunks(BATCH_SIZE) {
            let tx = conn.unchecked_transaction()?;
            for chunk in batch {
                let location = chunk.chunk.location();
                let id = crate::types::chunk_id(&chunk.file_path, location.start_line, location.end_line);
                let metadata = &chunk.chunk.metadata();
                let function_name = metadata.get("function_name").cloned();
                let class_name = metadata.get("class_name").cloned();
                let original_text = chunk.chunk.raw_content().to_string();
                let contextualised = chunk.chunk.embedding_text();
                let full_text_search = format!(
                    "{} {} {} {}",
                    contextualised,
                    function_name.as_deref().unwrap_or(""),
                    class_name.as_deref().unwrap_or(""),
                    chunk.file_path.display()
                );
                let metadata_json = serde_json::to_string(&metadata_to_json(metadata))
                    .map_err(|e| OmniError::Serialization(e.to_string()))?;

                tx.execute("DELETE FROM chunks_fts WHERE id = ?1", params![id])?;
                tx.execute(
                    "INSERT INTO chunks (
                        id, name, filename, line_from, line_to, original_text, contextualised_chunk,
                        embedding, code_embedding, language, chunk_type, function_name, class_name,
                        metadata, full_text_search, created_at, updated_at
                    ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,
                        COALESCE((SELECT created_at FROM chunks WHERE id = ?1), ?16), ?16)
                    ON CONFLICT(id) DO UPDATE SET
                        name=excluded.name, filename=excluded.filename, line_from=excluded.line_from,
                        line_to=excluded.line_to, original_text=excluded.original_text,
                        contextualised_chunk=excluded.contextualised_chunk, embedding=excluded.embedding,
                        code_embedding=excluded.code_embedding, language=excluded.language,
                        chunk_type=excluded.chunk_type, function_name=excluded.function_name,
                        class_name=excluded.class_name, metadata=excluded.metadata,
                        full_text_search=excluded.full_text_search, updated_at=excluded.updated_at",
                    params![
                        id,
                        partition,
                        chunk.file_path.to_string_lossy(),
                        location.start_line,
                        location.end_line,
                        original_text,
                        contextualised,
                        vec_to_blob(&chunk.embedding),
                        chunk.secondary_embedding.as_deref().map(vec_to_blob),
                        chunk.language.as_str(),
                        chunk.chunk.chunk_type().as_str(),
                        function_name,
                        class_name,
                        metadata_json,
                        full_text_search,
                        now,
                    ],
                )?;
                tx.execute(
                    "INSERT INTO chunks_fts (id, name, full_text_search) VALUES (?1, ?2, ?3)",
                    params![id, partition, full_text_search],
                )?;
            }
            tx.commit()?;
        }

        Ok(())
    }

    async fn delete_by_file_path(&self, path: &Path) -> OmniResult<()> {
        let conn = self.pool.acquire().await;
        let filename = path.to_string_lossy().to_string();
        conn.execute(
            "DELETE FROM chunks_fts WHERE id IN (SELECT id FROM chunks WHERE filename = ?1 AND name = ?2)",
            params![filename, self.partition],
        )?;
        conn.execute(
            "DELETE FROM chunks WHERE filename = ?1 AND name = ?2",
            params![filename, self.partition],
        )?;
        Ok(())
    }

    async fn search(
        &self,
        query_text: &str,
        query_embedding: Option<&[f32]>,
        max_results: usize,
    ) -> OmniResult<Vec<SearchResult>> {
        let conn = self.pool.acquire().await;
        let candidate_k = (max_results * 5).max(50);

        let mut vector_ranks: HashMap<String, u32> = HashMap::new();
        let mut rows_by_id: HashMap<String, Row> = HashMap::new();

        if let Some(query_embedding) = query_embedding {
            let mut stmt = conn.prepare(
                "SELECT id, filename, line_from, line_to, original_text, contextualised_chunk,
                        embedding, language, chunk_type, function_name, class_name, metadata
                 FROM chunks WHERE name = ?1",
            )?;
            let mut scored: Vec<(f64, Row)> = stmt
                .query_map(params![self.partition], |r| {
                    Ok(Row {
                        id: r.get(0)?,
                        filename: r.get(1)?,
                        line_from: r.get(2)?,
                        line_to: r.get(3)?,
                        original_text: r.get(4)?,
                        contextualised_chunk: r.get(5)?,
                        embedding: blob_to_vec(&r.get::<_, Vec<u8>>(6)?),
                        language: r.get(7)?,
                        chunk_type: r.get(8)?,
                        function_name: r.get(9)?,
                        class_name: r.get(10)?,
                        metadata: r.get(11)?,
                    })
                })?
                .filter_map(Result::ok)
                .map(|row| {
                    let score = cosine_similarity(query_embedding, &row.embedding);
                    (score, row)
                })
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(candidate_k);

            for (rank, (_, row)) in scored.into_iter().enumerate() {
                vector_ranks.insert(row.id.clone(), rank as u32 + 1);
                rows_by_id.insert(row.id.clone(), row);
            }
        }

        let mut text_ranks: HashMap<String, u32> = HashMap::new();
        if !query_text.trim().is_empty() {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.filename, c.line_from, c.line_to, c.original_text, c.contextualised_chunk,
                        c.embedding, c.language, c.chunk_type, c.function_name, c.class_name, c.metadata
                 FROM chunks_fts f JOIN chunks c ON c.id = f.id
                 WHERE f.full_text_search MATCH ?1 AND f.name = ?2
                 ORDER BY bm25(f) LIMIT ?3",
            );
            if let Ok(mut stmt) = stmt {
                let fts_query = sanitize_fts_query(query_text);
                let rows = stmt.query_map(params![fts_query, self.partition, candidate_k as i64], |r| {
                    Ok(Row {
                        id: r.get(0)?,
                        filename: r.get(1)?,
                        line_from: r.get(2)?,
                        line_to: r.get(3)?,
                        original_text: r.get(4)?,
                        contextualised_chunk: r.get(5)?,
                        embedding: blob_to_vec(&r.get::<_, Vec<u8>>(6)?),
                        language: r.get(7)?,
                        chunk_type: r.get(8)?,
                        function_name: r.get(9)?,
                        class_name: r.get(10)?,
                        metadata: r.get(11)?,
                    })
                });
                if let Ok(rows) = rows {
                    for (rank, row) in rows.filter_map(Result::ok).enumerate() {
                        text_ranks.insert(row.id.clone(), rank as u32 + 1);
                        rows_by_id.entry(row.id.clone()).or_insert(row);
                    }
                }
            }
        }

        let use_hybrid = self.hybrid_search && query_embedding.is_some() && !query_text.trim().is_empty();
        let mut scored: Vec<(f64, Row)> = Vec::new();
        for (id, row) in rows_by_id {
            let vector_rank = vector_ranks.get(&id).copied();
            let text_rank = text_ranks.get(&id).copied();
            let score = if use_hybrid {
                self.rrf.rrf_score(vector_rank, text_rank, self.vector_weight)
            } else if query_embedding.is_some() {
                vector_rank.map_or(0.0, |_| cosine_similarity(query_embedding.unwrap_or(&[]), &row.embedding))
            } else {
                text_rank.map_or(0.0, |r| 1.0 / (f64::from(self.rrf.k()) + f64::from(r)))
            };
            scored.push((score, row));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_results);

        Ok(scored
            .into_iter()
            .map(|(score, row)| {
                let id = row.id.clone();
                SearchResult {
                    id,
                    score,
                    document: row.into_document(),
                }
            })
            .collect())
    }

    async fn purge(&self) -> OmniResult<()> {
        let conn = self.pool.acquire().await;
        conn.execute("DELETE FROM chunks_fts WHERE name = ?1", params![self.partition])?;
        conn.execute("DELETE FROM chunks WHERE name = ?1", params![self.partition])?;
        Ok(())
    }

    async fn stats(&self) -> OmniResult<StoreStats> {
        let conn = self.pool.acquire().await;
        let total_chunks: u64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE name = ?1",
            params![self.partition],
            |r| r.get(0),
        )?;
        let total_documents: u64 = conn.query_row(
            "SELECT COUNT(DISTINCT filename) FROM chunks WHERE name = ?1",
            params![self.partition],
            |r| r.get(0),
        )?;
        Ok(StoreStats {
            total_documents,
            total_chunks,
            storage_size: None,
        })
    }
}

fn metadata_to_json(metadata: &HashMap<String, String>) -> HashMap<String, serde_json::Value> {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect()
}

/// FTS5 `MATCH` treats most punctuation as syntax; quote the query as a
/// single phrase so arbitrary user input can't break the query grammar.
fn sanitize_fts_query(query_text: &str) -> String {
    format!("\"{}\"", query_text.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkKind, PipelineChunk, SourceLocation};
    use tempfile::tempdir;

    fn test_config(repo_root: &Path) -> Config {
        let mut config = Config::default();
        config.repo_path = repo_root.to_path_buf();
        config
    }

    fn test_sql_config(repo_root: &Path) -> crate::config::SqlBackendConfig {
        crate::config::SqlBackendConfig {
            host: Some(repo_root.join("test.db").to_string_lossy().into_owned()),
            ..Default::default()
        }
    }

    fn embedded_chunk(path: &str, start: u32, end: u32, content: &str, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            file_path: path.into(),
            language: Language::Rust,
            chunk: PipelineChunk::Raw(Chunk {
                content: content.to_string(),
                location: SourceLocation::lines(start, end),
                chunk_type: ChunkKind::Function,
                metadata: HashMap::new(),
            }),
            embedding,
            secondary_embedding: None,
            natural_language_description: None,
        }
    }

    #[tokio::test]
    async fn test_index_then_vector_search_ranks_by_similarity() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let store = SqlStore::new(&config, &test_sql_config(dir.path())).unwrap();
        store.initialize().await.unwrap();

        let a = embedded_chunk("a.rs", 1, 5, "fn add(a: i32, b: i32) -> i32", vec![1.0, 0.0]);
        let b = embedded_chunk("b.rs", 1, 5, "fn unrelated()", vec![0.0, 1.0]);
        store.index_chunks(&[a, b]).await.unwrap();

        let results = store.search("", Some(&[1.0, 0.0]), 10).await.unwrap();
        assert_eq!(results[0].document.file_path, Path::new("a.rs"));
    }

    #[tokio::test]
    async fn test_delete_by_file_path_removes_only_that_file() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let store = SqlStore::new(&config, &test_sql_config(dir.path())).unwrap();
        store.initialize().await.unwrap();

        store
            .index_chunks(&[
                embedded_chunk("a.rs", 1, 5, "fn a()", vec![1.0, 0.0]),
                embedded_chunk("b.rs", 1, 5, "fn b()", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        store.delete_by_file_path(Path::new("a.rs")).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 1);
    }

    #[tokio::test]
    async fn test_purge_clears_partition() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let store = SqlStore::new(&config, &test_sql_config(dir.path())).unwrap();
        store.initialize().await.unwrap();
        store
            .index_chunks(&[embedded_chunk("a.rs", 1, 5, "fn a()", vec![1.0, 0.0])])
            .await
            .unwrap();
        store.purge().await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 0);
    }
}
