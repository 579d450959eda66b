//! Merkle synchroniser (C6): content-hash every file, build a Merkle DAG,
//! and diff it against the previously persisted snapshot to determine which
//! files changed between runs.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::OmniResult;
use crate::loader;

/// A single node in the Merkle DAG: either the root (data = concatenated
/// child hashes in insertion order) or a per-file leaf (data = `path:hash`).
///
/// Modeled with arena + index-handle parent/child links rather than owning
/// references, since traversal only ever goes root → children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleNode {
    /// Content-derived identity of this node.
    pub id: String,
    /// SHA-256 hex digest of `data`.
    pub hash: String,
    /// The raw data this node's hash was computed over.
    pub data: String,
    /// Parent node ids.
    pub parents: Vec<String>,
    /// Child node ids, in insertion order.
    pub children: Vec<String>,
}

/// The Merkle DAG for one snapshot: an arena of nodes plus root ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleDag {
    /// All nodes, keyed by id, in insertion order.
    pub nodes: Vec<(String, MerkleNode)>,
    /// Ids of root nodes (there is exactly one in practice).
    #[serde(rename = "rootIds")]
    pub root_ids: Vec<String>,
}

/// A persisted snapshot of a repository's file hashes and Merkle DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Relative path to SHA-256 hex digest, in sorted-path insertion order.
    #[serde(rename = "fileHashes")]
    pub file_hashes: Vec<(String, String)>,
    /// The Merkle DAG built from `file_hashes`.
    #[serde(rename = "merkleDAG")]
    pub merkle_dag: MerkleDag,
}

/// Added / modified / deleted relative paths between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Paths present only in the new tree.
    pub added: Vec<PathBuf>,
    /// Paths whose content hash changed.
    pub modified: Vec<PathBuf>,
    /// Paths present only in the old snapshot.
    pub deleted: Vec<PathBuf>,
}

impl ChangeSet {
    /// True when no file changed at all.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash every file selected by `config` under `repo_root`, in sorted path
/// order, and build the corresponding Merkle DAG.
///
/// Children are added in sorted-path order and the root's data is the
/// concatenation of child hashes in that same (insertion) order, so two
/// runs over an unchanged tree with identical config produce an identical
/// root identity.
pub fn build_dag(repo_root: &Path, config: &Config) -> OmniResult<(Vec<(String, String)>, MerkleDag)> {
    let files = loader::list_files(repo_root, None, config)?;

    let mut hashes: BTreeMap<String, String> = BTreeMap::new();
    for relative in &files {
        let absolute = repo_root.join(relative);
        let Ok(bytes) = std::fs::read(&absolute) else {
            continue;
        };
        hashes.insert(relative.to_string_lossy().replace('\\', "/"), sha256_hex(&bytes));
    }

    let mut nodes: Vec<(String, MerkleNode)> = Vec::with_capacity(hashes.len() + 1);
    let mut child_ids = Vec::with_capacity(hashes.len());
    let mut concatenated = String::new();

    for (path, hash) in &hashes {
        let data = format!("{path}:{hash}");
        let id = sha256_hex(data.as_bytes());
        concatenated.push_str(hash);
        child_ids.push(id.clone());
        nodes.push((
            id.clone(),
            MerkleNode {
                id,
                hash: hash.clone(),
                data,
                parents: Vec::new(),
                children: Vec::new(),
            },
        ));
    }

    let root_hash = sha256_hex(concatenated.as_bytes());
    let root_id = sha256_hex(format!("root:{root_hash}").as_bytes());
    for (_, node) in &mut nodes {
        node.parents.push(root_id.clone());
    }

    nodes.push((
        root_id.clone(),
        MerkleNode {
            id: root_id.clone(),
            hash: root_hash,
            data: concatenated,
            parents: Vec::new(),
            children: child_ids,
        },
    ));

    let file_hashes: Vec<(String, String)> = hashes.into_iter().collect();
    Ok((
        file_hashes,
        MerkleDag {
            nodes,
            root_ids: vec![root_id],
        },
    ))
}

/// Snapshot file path for `repo_root`: under the user-scoped state directory
/// keyed by an MD5 hash of the absolute repo path (§3, §6).
pub fn snapshot_path(repo_root: &Path) -> PathBuf {
    Config::state_dir(repo_root).join("snapshot.json")
}

/// Load the previously persisted snapshot, if any. A missing or unreadable
/// file is treated as "no snapshot" rather than an error.
pub fn load_snapshot(repo_root: &Path) -> Option<Snapshot> {
    let path = snapshot_path(repo_root);
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

/// Persist the current tree's snapshot, written atomically (temp file + rename).
pub fn save_snapshot(repo_root: &Path, config: &Config) -> OmniResult<Snapshot> {
    let (file_hashes, merkle_dag) = build_dag(repo_root, config)?;
    let snapshot = Snapshot { file_hashes, merkle_dag };

    let path = snapshot_path(repo_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(&snapshot).map_err(|e| crate::error::OmniError::Serialization(e.to_string()))?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, text)?;
    std::fs::rename(&tmp_path, &path)?;

    Ok(snapshot)
}

/// Delete the persisted snapshot for `repo_root`, if any.
pub fn delete_snapshot(repo_root: &Path) -> OmniResult<()> {
    let path = snapshot_path(repo_root);
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Diff the current tree against the persisted snapshot (or an empty one if
/// none exists) and return the added/modified/deleted relative paths.
pub fn detect_changes(repo_root: &Path, config: &Config) -> OmniResult<ChangeSet> {
    let previous = load_snapshot(repo_root);
    let (current_hashes, current_dag) = build_dag(repo_root, config)?;

    let Some(previous) = previous else {
        return Ok(ChangeSet {
            added: current_hashes.into_iter().map(|(p, _)| PathBuf::from(p)).collect(),
            modified: Vec::new(),
            deleted: Vec::new(),
        });
    };

    if previous.merkle_dag.root_ids == current_dag.root_ids {
        return Ok(ChangeSet::default());
    }

    let old_map: HashMap<&str, &str> = previous
        .file_hashes
        .iter()
        .map(|(p, h)| (p.as_str(), h.as_str()))
        .collect();
    let new_map: HashMap<&str, &str> = current_hashes.iter().map(|(p, h)| (p.as_str(), h.as_str())).collect();

    let mut added = Vec::new();
    let mut modified = Vec::new();
    for (path, hash) in &new_map {
        match old_map.get(path) {
            None => added.push(PathBuf::from(*path)),
            Some(old_hash) if old_hash != hash => modified.push(PathBuf::from(*path)),
            Some(_) => {}
        }
    }

    let mut deleted = Vec::new();
    for path in old_map.keys() {
        if !new_map.contains_key(path) {
            deleted.push(PathBuf::from(*path));
        }
    }

    added.sort();
    modified.sort();
    deleted.sort();

    Ok(ChangeSet { added, modified, deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_first_run_reports_everything_added() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.rs", "fn a() {}");
        write(dir.path(), "b.rs", "fn b() {}");
        let config = Config::default();

        let changes = detect_changes(dir.path(), &config).unwrap();
        assert_eq!(changes.added.len(), 2);
        assert!(changes.modified.is_empty());
        assert!(changes.deleted.is_empty());
    }

    #[test]
    fn test_unchanged_tree_after_save_reports_no_changes() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.rs", "fn a() {}");
        let config = Config::default();

        save_snapshot(dir.path(), &config).unwrap();
        let changes = detect_changes(dir.path(), &config).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_incremental_added_modified_deleted() {
        let dir = tempdir().unwrap();
        write(dir.path(), "file1.rs", "a=1");
        write(dir.path(), "file2.rs", "b=2");
        write(dir.path(), "file3.rs", "c=3");
        let config = Config::default();

        save_snapshot(dir.path(), &config).unwrap();

        write(dir.path(), "file1.rs", "a=2");
        write(dir.path(), "file4.rs", "d=4");
        std::fs::remove_file(dir.path().join("file3.rs")).unwrap();

        let changes = detect_changes(dir.path(), &config).unwrap();
        assert_eq!(changes.added, vec![PathBuf::from("file4.rs")]);
        assert_eq!(changes.modified, vec![PathBuf::from("file1.rs")]);
        assert_eq!(changes.deleted, vec![PathBuf::from("file3.rs")]);
    }

    #[test]
    fn test_save_load_round_trip_is_identity() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.rs", "fn a() {}");
        let config = Config::default();

        let saved = save_snapshot(dir.path(), &config).unwrap();
        let loaded = load_snapshot(dir.path()).unwrap();
        assert_eq!(saved.file_hashes, loaded.file_hashes);
        assert_eq!(saved.merkle_dag.root_ids, loaded.merkle_dag.root_ids);
    }

    #[test]
    fn test_delete_snapshot_then_detect_changes_sees_all_added_again() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.rs", "fn a() {}");
        let config = Config::default();

        save_snapshot(dir.path(), &config).unwrap();
        delete_snapshot(dir.path()).unwrap();
        assert!(load_snapshot(dir.path()).is_none());

        let changes = detect_changes(dir.path(), &config).unwrap();
        assert_eq!(changes.added, vec![PathBuf::from("a.rs")]);
    }

    #[test]
    fn test_deterministic_root_identity_for_same_content() {
        let dir1 = tempdir().unwrap();
        let dir2 = tempdir().unwrap();
        write(dir1.path(), "a.rs", "fn a() {}");
        write(dir1.path(), "b.rs", "fn b() {}");
        write(dir2.path(), "b.rs", "fn b() {}");
        write(dir2.path(), "a.rs", "fn a() {}");

        let config = Config::default();
        let (_, dag1) = build_dag(dir1.path(), &config).unwrap();
        let (_, dag2) = build_dag(dir2.path(), &config).unwrap();
        assert_eq!(dag1.root_ids, dag2.root_ids);
    }
}
