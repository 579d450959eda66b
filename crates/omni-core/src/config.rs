//! Layered configuration: compiled defaults, presets, repository overrides,
//! and environment variables, merged into one effective [`Config`].
//!
//! On-disk layout is nested (`chunking.*`, `embedding.*`, `search.*`) per the
//! resolved ambiguity documented in `SPEC_FULL.md`; legacy flat keys
//! (`chunk_size`, `chunk_overlap` at the document root) are migrated on read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OmniError, OmniResult};

/// Default maximum file size considered for indexing (1 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;
/// Default chunk size in characters (§4.2).
pub const DEFAULT_CHUNK_SIZE: u32 = 2500;
/// Default chunk overlap in characters (§4.2).
pub const DEFAULT_CHUNK_OVERLAP: u32 = 300;
/// Default bounded parallelism for per-file pipeline work (§5).
pub const DEFAULT_PARALLEL_BATCH_SIZE: usize = 15;
/// Default RRF constant `k` (§4.8).
pub const DEFAULT_RRF_K: u32 = 60;
/// Default vector-weight share in hybrid RRF (§4.8).
pub const DEFAULT_VECTOR_WEIGHT: f64 = 0.7;
/// Default search result count.
pub const DEFAULT_MAX_RESULTS: usize = 10;
/// Default SQL connection pool size (§5).
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Chunk-splitting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Language-aware AST splitting with a line-based fallback.
    Ast,
    /// Single LLM call jointly chunks and contextualises the whole file.
    Llm,
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        Self::Ast
    }
}

/// Chunking behaviour (`chunking.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters before re-splitting.
    pub size: u32,
    /// Character overlap prepended between consecutive chunks.
    pub overlap: u32,
    /// `ast` or `llm`.
    pub strategy: ChunkStrategy,
    /// Whether to additionally embed a natural-language translation per chunk.
    pub dual_embedding: bool,
    /// Whether to call the contextualiser at all.
    pub contextual_chunking: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            strategy: ChunkStrategy::default(),
            dual_embedding: false,
            contextual_chunking: true,
        }
    }
}

/// Embedding provider selection (`embedding.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider identifier (e.g. "openai", "vertex", "voyage").
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Provider project id, when the provider is project-scoped.
    pub project: Option<String>,
    /// Provider region, when the provider is region-scoped.
    pub region: Option<String>,
    /// Embedding dimensionality, informational for stores that need to size columns.
    pub dimensions: u32,
    /// Per-minute token quota for the sliding-window rate limiter.
    pub tokens_per_minute: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            project: None,
            region: None,
            dimensions: 1536,
            tokens_per_minute: 1_000_000,
        }
    }
}

/// Contextualiser/translator LLM provider selection (`llm.*`).
///
/// Shared between C3 and C4: both are chat-completion callers against the
/// same kind of endpoint, so they share one provider/model configuration
/// rather than each inventing their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider identifier (e.g. "openai", "anthropic").
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Maximum retries on transient/server errors before giving up.
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_retries: 3,
        }
    }
}

/// Reranking stage configuration (`search.reranking`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankingConfig {
    /// Whether reranking is active.
    pub enabled: bool,
    /// Reranker provider identifier.
    pub provider: String,
    /// Reranker model identifier.
    pub model: String,
    /// Number of results to keep after reranking.
    pub top_k: usize,
}

impl Default for RerankingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "cohere".to_string(),
            model: "rerank-english-v3.0".to_string(),
            top_k: 10,
        }
    }
}

/// Search-time behaviour (`search.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Whether to fuse vector and lexical results via RRF (Shape A only).
    pub hybrid_search: bool,
    /// Reciprocal-rank-fusion vector-share weight, `w_v` in §4.8.
    pub vector_weight: f64,
    /// RRF constant `k`.
    pub rrf_k: u32,
    /// Default result count when the caller doesn't specify one.
    pub default_max_results: usize,
    /// Reranking stage settings.
    pub reranking: RerankingConfig,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            hybrid_search: true,
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            rrf_k: DEFAULT_RRF_K,
            default_max_results: DEFAULT_MAX_RESULTS,
            reranking: RerankingConfig::default(),
        }
    }
}

/// SQL-backed store connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlBackendConfig {
    /// Host/path of the SQL store. For the embedded backend this is a file path.
    pub host: Option<String>,
    /// Port, when the backend is a network service.
    pub port: Option<u16>,
    /// Database name, or file name for the embedded backend.
    pub database: String,
    /// Username, when applicable.
    pub user: Option<String>,
    /// Password, when applicable. Never logged.
    pub password: Option<String>,
    /// Maximum size of the connection pool.
    pub max_connections: u32,
}

impl Default for SqlBackendConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            database: "omnicontext.db".to_string(),
            user: None,
            password: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Managed search-service connection parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedBackendConfig {
    /// Provider project id.
    pub project_id: Option<String>,
    /// Provider region.
    pub region: Option<String>,
    /// Document collection / index name.
    pub collection_id: Option<String>,
    /// Provider location (distinct from region for some providers).
    pub location: Option<String>,
    /// Datastore id, for providers that scope a collection under a datastore.
    pub datastore_id: Option<String>,
    /// Base URL override, mainly for tests against a local stand-in service.
    pub endpoint: Option<String>,
}

/// Which vector-store shape (§4.8) to instantiate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Shape A: embedded SQL + ANN + lexical index.
    Sql(SqlBackendConfig),
    /// Shape B: managed document-store search service.
    Managed(ManagedBackendConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Sql(SqlBackendConfig::default())
    }
}

/// Logging behaviour, driven into a `tracing-subscriber` at binary entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive, e.g. "info" or "omni_core=debug".
    pub level: String,
    /// Emit structured JSON instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// The fully-resolved per-repository configuration (`VectorStoreConfig`, §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Absolute path of the repository this config applies to.
    #[serde(skip)]
    pub repo_path: PathBuf,
    /// Tenant/partition key within a single store; `None` means the default partition.
    pub name: Option<String>,
    /// Strict include globs. When non-empty, no other ignore list is applied.
    pub include_patterns: Vec<String>,
    /// Recognised source extensions, used to build the default include glob.
    pub file_extensions: Vec<String>,
    /// Skip files larger than this, in bytes.
    pub max_file_size: u64,
    /// Chunking behaviour.
    pub chunking: ChunkingConfig,
    /// Embedding provider selection.
    pub embedding: EmbeddingConfig,
    /// Contextualiser/translator LLM provider selection.
    pub llm: LlmConfig,
    /// Search-time behaviour.
    pub search: SearchSettings,
    /// Persist chunk payloads for offline inspection.
    pub log_chunks: bool,
    /// Which store shape and connection parameters to use.
    pub backend: BackendConfig,
    /// Written by the orchestrator after a successful run.
    pub indexed: bool,
    /// Ambient logging configuration.
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::new(),
            name: None,
            include_patterns: Vec::new(),
            file_extensions: default_extensions(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            search: SearchSettings::default(),
            log_chunks: false,
            backend: BackendConfig::default(),
            indexed: false,
            logging: LoggingConfig::default(),
        }
    }
}

/// Built-in directory names always excluded from the default walk, regardless
/// of `include_patterns` (§4.1).
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    ".next",
    "coverage",
    ".cache",
];

fn default_extensions() -> Vec<String> {
    [
        "py", "ts", "tsx", "js", "jsx", "mjs", "cjs", "rs", "go", "java", "c", "h", "cpp", "cc",
        "cxx", "hpp", "cs", "css", "scss", "rb", "php", "swift", "kt", "kts", "html", "htm", "sh",
        "md", "mdx", "toml", "yml", "yaml", "json",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Config {
    /// Validate this configuration against §4.11's rules.
    pub fn validate(&self) -> OmniResult<()> {
        if let Some(name) = &self.name {
            let valid = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return Err(OmniError::Config {
                    details: format!("config name {name:?} must match [A-Za-z0-9_-]+"),
                });
            }
        }

        if !(100..=10_000).contains(&self.chunking.size) {
            return Err(OmniError::Config {
                details: format!("chunking.size {} must be within [100, 10000]", self.chunking.size),
            });
        }

        if self.chunking.overlap >= self.chunking.size {
            return Err(OmniError::Config {
                details: format!(
                    "chunking.overlap ({}) must be less than chunking.size ({})",
                    self.chunking.overlap, self.chunking.size
                ),
            });
        }

        if self.max_file_size < 1024 {
            return Err(OmniError::Config {
                details: format!("max_file_size ({} bytes) must be at least 1 KiB", self.max_file_size),
            });
        }

        Ok(())
    }

    /// Directory under which per-repository runtime state (Merkle snapshot,
    /// embedded SQL database when no explicit path is set) is stored.
    ///
    /// Keyed by an MD5 hash of the absolute repository path, per §3/§6 — a
    /// deliberately different scheme from any content hash used elsewhere.
    pub fn state_dir(repo_path: &Path) -> PathBuf {
        let abs = repo_path
            .canonicalize()
            .unwrap_or_else(|_| repo_path.to_path_buf());
        let digest = md5::compute(abs.to_string_lossy().as_bytes());
        let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        base.join("omnicontext").join(format!("{digest:x}"))
    }

    /// Path to the `.omnicontext/config.toml` project-local config file.
    pub fn project_config_path(repo_path: &Path) -> PathBuf {
        repo_path.join(".omnicontext").join("config.toml")
    }

    /// Path to the `~/.config/omnicontext/config.toml` user config file.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("omnicontext").join("config.toml"))
    }

    /// Load the effective config for `repo_path`: defaults ⊕ preset (if the
    /// repository config references one) ⊕ user config ⊕ project config ⊕
    /// environment overrides.
    pub fn load(repo_path: &Path, preset_name: Option<&str>) -> OmniResult<Self> {
        let mut config = Self {
            repo_path: repo_path.to_path_buf(),
            ..Self::default()
        };

        if let Some(name) = preset_name {
            let presets = PresetRegistry::load_from_env()?;
            if let Some(preset) = presets.get(name) {
                merge_value_into(&mut config, preset)?;
            } else {
                return Err(OmniError::Config {
                    details: format!("unknown preset: {name}"),
                });
            }
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                merge_from_file(&mut config, &user_path)?;
            }
        }

        let project_path = Self::project_config_path(repo_path);
        if project_path.exists() {
            merge_from_file(&mut config, &project_path)?;
        } else if let Some(resolved) = ManifestConfig::load(repo_path)? {
            merge_value_into(&mut config, &resolved)?;
        }

        apply_env_overrides(&mut config);
        config.repo_path = repo_path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Persist this config as the project-local `.omnicontext/config.toml`.
    pub fn save(&self) -> OmniResult<()> {
        let path = Self::project_config_path(&self.repo_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| OmniError::Serialization(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// `.vectorconfig.json` or a package manifest's `vectorStore` field: either a
/// single config object or an array of named configs (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ManifestConfig {
    Single(serde_json::Value),
    Named(Vec<serde_json::Value>),
}

impl ManifestConfig {
    fn load(repo_path: &Path) -> OmniResult<Option<serde_json::Value>> {
        let direct = repo_path.join(".vectorconfig.json");
        if direct.exists() {
            let text = std::fs::read_to_string(&direct)?;
            let parsed: Self = serde_json::from_str(&text).map_err(|e| OmniError::Serialization(e.to_string()))?;
            return Ok(Some(parsed.select(None)?));
        }

        let manifest = repo_path.join("package.json");
        if manifest.exists() {
            let text = std::fs::read_to_string(&manifest)?;
            let doc: serde_json::Value = serde_json::from_str(&text).map_err(|e| OmniError::Serialization(e.to_string()))?;
            if let Some(field) = doc.get("vectorStore") {
                let parsed: Self = serde_json::from_value(field.clone()).map_err(|e| OmniError::Serialization(e.to_string()))?;
                return Ok(Some(parsed.select(None)?));
            }
        }

        Ok(None)
    }

    /// Select a named config from an array (by `name`, else the first entry).
    fn select(self, name: Option<&str>) -> OmniResult<serde_json::Value> {
        match self {
            Self::Single(v) => Ok(migrate_flat_keys(v)),
            Self::Named(list) => {
                let names: Vec<Option<&str>> = list
                    .iter()
                    .map(|v| v.get("name").and_then(|n| n.as_str()))
                    .collect();
                if names.iter().any(Option::is_none) {
                    return Err(OmniError::Config {
                        details: "all entries in a named config array must have a name".to_string(),
                    });
                }
                let mut unique = names.clone();
                unique.sort_unstable();
                unique.dedup();
                if unique.len() != names.len() {
                    return Err(OmniError::Config {
                        details: "named config array contains duplicate names".to_string(),
                    });
                }

                let chosen = if let Some(target) = name {
                    list.into_iter().find(|v| v.get("name").and_then(|n| n.as_str()) == Some(target))
                } else {
                    list.into_iter().next()
                };

                chosen
                    .map(migrate_flat_keys)
                    .ok_or_else(|| OmniError::Config {
                        details: "no matching named config found".to_string(),
                    })
            }
        }
    }
}

/// Migrate legacy flat keys (`chunk_size`, `chunk_overlap` at the document
/// root) into the nested `chunking.*` shape SPEC_FULL picked as canonical.
fn migrate_flat_keys(mut value: serde_json::Value) -> serde_json::Value {
    let Some(obj) = value.as_object_mut() else {
        return value;
    };

    let flat_keys = [
        ("chunk_size", "size"),
        ("chunk_overlap", "overlap"),
        ("chunk_strategy", "strategy"),
        ("dual_embedding", "dual_embedding"),
        ("contextual_chunking", "contextual_chunking"),
    ];

    let mut chunking = obj
        .remove("chunking")
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();

    for (flat, nested) in flat_keys {
        if let Some(v) = obj.remove(flat) {
            chunking.entry(nested.to_string()).or_insert(v);
        }
    }

    if !chunking.is_empty() {
        obj.insert("chunking".to_string(), serde_json::Value::Object(chunking));
    }

    value
}

fn merge_from_file(config: &mut Config, path: &Path) -> OmniResult<()> {
    let text = std::fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&text).map_err(|e| OmniError::Serialization(e.to_string()))?;
    let json = serde_json::to_value(value).map_err(|e| OmniError::Serialization(e.to_string()))?;
    merge_value_into(config, &migrate_flat_keys(json))
}

/// Overlay `patch` onto `config`'s serialised form, keeping any field absent
/// from `patch` at its current value (`defaults ⊕ preset ⊕ overrides`).
fn merge_value_into(config: &mut Config, patch: &serde_json::Value) -> OmniResult<()> {
    let mut base = serde_json::to_value(&*config).map_err(|e| OmniError::Serialization(e.to_string()))?;
    deep_merge(&mut base, patch);
    let merged: Config = serde_json::from_value(base).map_err(|e| OmniError::Serialization(e.to_string()))?;
    *config = Config {
        repo_path: config.repo_path.clone(),
        ..merged
    };
    Ok(())
}

fn deep_merge(base: &mut serde_json::Value, patch: &serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                deep_merge(base_map.entry(key.clone()).or_insert(serde_json::Value::Null), value);
            }
        }
        (base_slot, patch_value) => {
            *base_slot = patch_value.clone();
        }
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(level) = std::env::var("OMNI_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(provider) = std::env::var("OMNI_EMBEDDING_PROVIDER") {
        config.embedding.provider = provider;
    }
    if let Ok(model) = std::env::var("OMNI_EMBEDDING_MODEL") {
        config.embedding.model = model;
    }

    let sql_host = std::env::var("OMNI_SQL_HOST").ok();
    let managed_project = std::env::var("OMNI_MANAGED_PROJECT_ID").ok();

    match (&mut config.backend, sql_host.clone(), managed_project.clone()) {
        (BackendConfig::Sql(sql), Some(host), _) => sql.host = Some(host),
        (BackendConfig::Managed(managed), _, Some(project)) => managed.project_id = Some(project),
        _ => {}
    }

    // Auto-detect (§4.11): only when the repository config never chose a
    // backend explicitly and an environment signal for the other shape exists.
    if matches!(&config.backend, BackendConfig::Sql(s) if s.host.is_none()) {
        if let Some(project) = managed_project {
            config.backend = BackendConfig::Managed(ManagedBackendConfig {
                project_id: Some(project),
                ..ManagedBackendConfig::default()
            });
        } else if let Some(host) = sql_host {
            if let BackendConfig::Sql(sql) = &mut config.backend {
                sql.host = Some(host);
            }
        }
    }
}

/// Named registry of preset configs, resolved from `OMNICONTEXT_PRESETS_PATH`.
pub struct PresetRegistry {
    presets: HashMap<String, serde_json::Value>,
}

impl PresetRegistry {
    /// Load the registry from the path given by `OMNICONTEXT_PRESETS_PATH`.
    ///
    /// Returns an empty registry (not an error) when the variable is unset,
    /// so repositories that don't reference a preset pay no cost.
    pub fn load_from_env() -> OmniResult<Self> {
        let Ok(path) = std::env::var("OMNICONTEXT_PRESETS_PATH") else {
            return Ok(Self { presets: HashMap::new() });
        };
        Self::load_from_path(Path::new(&path))
    }

    /// Load the registry from an explicit path; the file is a JSON object
    /// mapping preset name to a partial config document.
    pub fn load_from_path(path: &Path) -> OmniResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let raw: HashMap<String, serde_json::Value> =
            serde_json::from_str(&text).map_err(|e| OmniError::Serialization(e.to_string()))?;
        let presets = raw.into_iter().map(|(k, v)| (k, migrate_flat_keys(v))).collect();
        Ok(Self { presets })
    }

    /// Look up a preset by name.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.presets.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut config = Config::default();
        config.name = Some("bad name!".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlap_must_be_less_than_size() {
        let mut config = Config::default();
        config.chunking.overlap = config.chunking.size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_size_bounds() {
        let mut config = Config::default();
        config.chunking.size = 50;
        assert!(config.validate().is_err());
        config.chunking.size = 20_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_state_dir_deterministic_for_same_path() {
        let a = Config::state_dir(Path::new("/tmp/repo-a"));
        let b = Config::state_dir(Path::new("/tmp/repo-a"));
        assert_eq!(a, b);
        let c = Config::state_dir(Path::new("/tmp/repo-b"));
        assert_ne!(a, c);
    }

    #[test]
    fn test_migrate_flat_keys_into_nested_chunking() {
        let flat = serde_json::json!({ "chunk_size": 3000, "chunk_overlap": 200 });
        let migrated = migrate_flat_keys(flat);
        assert_eq!(migrated["chunking"]["size"], 3000);
        assert_eq!(migrated["chunking"]["overlap"], 200);
    }

    #[test]
    fn test_preset_then_override_merge() {
        let mut config = Config::default();
        let preset = serde_json::json!({ "chunking": { "size": 2000 } });
        merge_value_into(&mut config, &preset).unwrap();
        assert_eq!(config.chunking.size, 2000);

        let overrides = serde_json::json!({ "chunking": { "size": 3000 } });
        merge_value_into(&mut config, &overrides).unwrap();
        assert_eq!(config.chunking.size, 3000);
        // Overlap untouched by the override, stays at preset/default value.
        assert_eq!(config.chunking.overlap, DEFAULT_CHUNK_OVERLAP);
    }

    #[test]
    fn test_config_round_trip_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.chunking.size, config.chunking.size);
        assert_eq!(parsed.search.vector_weight, config.search.vector_weight);
    }
}
