//! Cross-module: Merkle change detection + pipeline orchestrator (C6 + C10).
//!
//! Mirrors the canonical incremental-sync scenario: full index, then modify
//! one file, add another, delete a third, and check that an incremental run
//! touches exactly the changed set and that search reflects it.

use std::path::Path;

use omni_core::config::{BackendConfig, Config};
use omni_core::pipeline::{Engine, IndexOptions, SearchOptions};

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn config_for(dir: &Path) -> Config {
    let mut config = Config {
        repo_path: dir.to_path_buf(),
        backend: BackendConfig::default(),
        ..Config::default()
    };
    config.chunking.contextual_chunking = false;
    config
}

#[tokio::test]
async fn test_incremental_sync_reports_added_modified_deleted_and_search_reflects_it() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "file1.rs", "fn a() -> i32 { 1 }\n");
    write(dir.path(), "file2.rs", "fn b() -> i32 { 2 }\n");
    write(dir.path(), "file3.rs", "fn c() -> i32 { 3 }\n");

    let mut engine = Engine::with_config(config_for(dir.path())).unwrap();
    let full_stats = engine
        .index_repository(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(full_stats.files_indexed, 3);

    // Modify file1, add file4, delete file3.
    write(dir.path(), "file1.rs", "fn a_modified() -> i32 { 42 }\n");
    write(dir.path(), "file4.rs", "fn d() -> i32 { 4 }\n");
    std::fs::remove_file(dir.path().join("file3.rs")).unwrap();

    let options = IndexOptions {
        incremental: true,
        ..Default::default()
    };
    let incremental_stats = engine.index_repository(dir.path(), options, None).await.unwrap();

    // Exactly the changed set: file1 (modified) + file4 (added).
    assert_eq!(incremental_stats.files_indexed, 2);
    assert_eq!(incremental_stats.files_deleted, 1);
    assert!(incremental_stats.failed_files.is_empty());

    let hits = engine
        .search("a_modified", SearchOptions::default())
        .await
        .unwrap();
    assert!(hits.iter().any(|r| r.document.file_path == Path::new("file1.rs")));
    assert!(hits.iter().all(|r| r.document.file_path != Path::new("file3.rs")));

    let added_hits = engine.search("fn d", SearchOptions::default()).await.unwrap();
    assert!(added_hits.iter().any(|r| r.document.file_path == Path::new("file4.rs")));
}

#[tokio::test]
async fn test_second_incremental_run_with_no_changes_indexes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "only.rs", "fn only() {}\n");

    let mut engine = Engine::with_config(config_for(dir.path())).unwrap();
    engine
        .index_repository(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();

    let options = IndexOptions {
        incremental: true,
        ..Default::default()
    };
    let stats = engine.index_repository(dir.path(), options, None).await.unwrap();
    assert_eq!(stats.files_indexed, 0);
    assert_eq!(stats.files_deleted, 0);
}
