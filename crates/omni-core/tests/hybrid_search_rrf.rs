//! Cross-module: embedded SQL store + RRF fusion (C8 + C9).
//!
//! Exercises dense+sparse fusion end to end rather than unit-testing the
//! RRF formula in isolation: a chunk that ranks well on both signals must
//! outrank one that only wins on one of them.

use std::collections::HashMap;
use std::path::PathBuf;

use omni_core::config::Config;
use omni_core::store::sql::SqlStore;
use omni_core::store::VectorStore;
use omni_core::types::{Chunk, ChunkKind, EmbeddedChunk, Language, PipelineChunk, SourceLocation};

fn embedded_chunk(path: &str, content: &str, embedding: Vec<f32>) -> EmbeddedChunk {
    let chunk = Chunk {
        content: content.to_string(),
        location: SourceLocation::lines(1, content.lines().count().max(1) as u32),
        chunk_type: ChunkKind::Function,
        metadata: HashMap::new(),
    };
    EmbeddedChunk {
        file_path: PathBuf::from(path),
        language: Language::Rust,
        chunk: PipelineChunk::Raw(chunk),
        embedding,
        secondary_embedding: None,
        natural_language_description: None,
    }
}

#[tokio::test]
async fn test_hybrid_search_favours_chunk_matching_both_signals() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config {
        repo_path: dir.path().to_path_buf(),
        ..Config::default()
    };
    config.search.hybrid_search = true;
    config.search.vector_weight = 0.5;

    let sql_config = match &config.backend {
        omni_core::config::BackendConfig::Sql(sql) => sql.clone(),
        omni_core::config::BackendConfig::Managed(_) => unreachable!("default backend is sql"),
    };
    let store = SqlStore::new(&config, &sql_config).unwrap();
    store.initialize().await.unwrap();

    // Query vector points at [1, 0]. `both.rs` is an exact lexical AND vector
    // match; `lexical_only.rs` shares the query text but its embedding is
    // orthogonal; `vector_only.rs` shares the embedding but its text has no
    // lexical overlap with the query.
    let query_embedding = vec![1.0_f32, 0.0];

    let both = embedded_chunk("both.rs", "fn parse_config_file() -> Config", vec![1.0, 0.0]);
    let lexical_only = embedded_chunk("lexical_only.rs", "fn parse_config_file_from_env()", vec![0.0, 1.0]);
    let vector_only = embedded_chunk("vector_only.rs", "fn unrelated_helper()", vec![0.9, 0.1]);

    store.index_chunks(&[both, lexical_only, vector_only]).await.unwrap();

    let results = store.search("parse_config_file", Some(&query_embedding), 10).await.unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].document.file_path, PathBuf::from("both.rs"));

    let ranked_paths: Vec<_> = results.iter().map(|r| r.document.file_path.clone()).collect();
    assert!(ranked_paths.contains(&PathBuf::from("lexical_only.rs")) || ranked_paths.contains(&PathBuf::from("vector_only.rs")));
}

#[tokio::test]
async fn test_vector_only_search_ranks_by_cosine_similarity() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        repo_path: dir.path().to_path_buf(),
        ..Config::default()
    };
    let sql_config = match &config.backend {
        omni_core::config::BackendConfig::Sql(sql) => sql.clone(),
        omni_core::config::BackendConfig::Managed(_) => unreachable!("default backend is sql"),
    };
    let store = SqlStore::new(&config, &sql_config).unwrap();
    store.initialize().await.unwrap();

    let close = embedded_chunk("close.rs", "alpha", vec![1.0, 0.0]);
    let far = embedded_chunk("far.rs", "beta", vec![0.0, 1.0]);
    store.index_chunks(&[close, far]).await.unwrap();

    let results = store.search("zzz no lexical overlap", Some(&[1.0, 0.0]), 10).await.unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].document.file_path, PathBuf::from("close.rs"));
}
