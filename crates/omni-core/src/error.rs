//! Error types for omni-core.
//!
//! Uses a hierarchical error enum so callers can pattern-match on
//! the subsystem that failed. Each subsystem also has its own error
//! type internally, which gets converted to `OmniError` at the boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all omni-core operations.
#[derive(Debug, Error)]
pub enum OmniError {
    // ---- Recoverable (operation failed, system healthy) ----
    /// A single file failed to parse. The rest of the index is fine.
    #[error("parse error for {path}: {message}")]
    Parse {
        /// Path to the file that failed to parse.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// Embedding failed for a chunk.
    #[error("embedding error for chunk {chunk_id}: {message}")]
    Embed {
        /// Deterministic chunk id that failed to embed.
        chunk_id: String,
        /// Human-readable error description.
        message: String,
    },

    /// Requested entity was not found in the store.
    #[error("not found: {entity}")]
    NotFound {
        /// Description of what was not found.
        entity: String,
    },

    // ---- Provider errors (recoverable via breaker/retry) ----
    /// The provider rejected the request due to quota/rate-limit exhaustion.
    ///
    /// Distinguished from [`OmniError::Provider`] so the circuit breaker's
    /// classifier can pattern-match it cheaply without re-inspecting message text.
    #[error("provider quota exceeded: {provider} ({reason})")]
    Quota {
        /// Name of the provider that rejected the call (embedding/LLM/rerank).
        provider: String,
        /// Raw reason string from the provider, if any.
        reason: String,
    },

    /// A provider call failed for a reason other than quota exhaustion.
    #[error("provider error: {provider}: {message}")]
    Provider {
        /// Name of the provider that failed.
        provider: String,
        /// Human-readable error description.
        message: String,
    },

    // ---- Degraded (system works with reduced capability) ----
    /// Reranker is unavailable. Search falls back to hybrid-only ranking.
    #[error("reranker unavailable: {reason}")]
    RerankerUnavailable {
        /// Why the reranker couldn't be reached.
        reason: String,
    },

    // ---- Fatal (system cannot operate) ----
    /// Vector store corruption or schema mismatch detected.
    #[error("store corruption: {details}")]
    StoreCorruption {
        /// Diagnostic details.
        details: String,
    },

    /// Configuration is invalid or missing required fields.
    #[error("configuration error: {details}")]
    Config {
        /// What's wrong with the config.
        details: String,
    },

    // ---- Wrapped external errors ----
    /// SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error talking to a provider or managed store backend.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OmniError {
    /// Returns true if this error represents quota/rate-limit exhaustion.
    ///
    /// Used by the circuit breaker to decide whether a failure should open
    /// the circuit (quota) or merely count toward a generic failure budget.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::Quota { .. })
    }
}

/// Convenience type alias for Results in omni-core.
pub type OmniResult<T> = Result<T, OmniError>;
