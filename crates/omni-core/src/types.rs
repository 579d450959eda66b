//! Core domain types shared across all omni-core subsystems.
//!
//! These types form the API contract between modules: the chunker produces
//! [`Chunk`]s, the contextualiser turns them into [`ContextualisedChunk`]s,
//! the embedder and translator turn those into [`EmbeddedChunk`]s, and the
//! vector store turns a query back into [`SearchResult`]s.

use std::collections::HashMap;
use std::path::PathBuf;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// File-level types
// ---------------------------------------------------------------------------

/// Metadata and content of a file read from the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// Absolute path on disk.
    pub file_path: PathBuf,
    /// Path relative to the repository root (used as the store's partition key).
    pub relative_path: PathBuf,
    /// Detected programming language.
    pub language: Language,
    /// File content, decoded as UTF-8.
    pub content: String,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time, Unix seconds.
    pub last_modified: i64,
}

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Supported programming languages and document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python (.py)
    Python,
    /// TypeScript (.ts, .tsx)
    TypeScript,
    /// JavaScript (.js, .jsx)
    JavaScript,
    /// Rust (.rs)
    Rust,
    /// Go (.go)
    Go,
    /// Java (.java)
    Java,
    /// C (.c, .h)
    C,
    /// C++ (.cpp, .cc, .cxx, .hpp, .hxx)
    Cpp,
    /// C# (.cs)
    CSharp,
    /// CSS / SCSS (.css, .scss)
    Css,
    /// Ruby (.rb)
    Ruby,
    /// PHP (.php)
    Php,
    /// Swift (.swift)
    Swift,
    /// Kotlin (.kt, .kts)
    Kotlin,
    /// HTML (.html, .htm)
    Html,
    /// Shell / Bash (.sh, .bash, .zsh)
    Shell,
    /// Markdown (.md, .mdx)
    Markdown,
    /// TOML configuration (.toml)
    Toml,
    /// YAML configuration (.yml, .yaml)
    Yaml,
    /// JSON data (.json, .jsonc)
    Json,
    /// Unknown / unsupported
    Unknown,
}

impl Language {
    /// Detect language from file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "py" => Self::Python,
            "ts" | "tsx" => Self::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "rs" => Self::Rust,
            "go" => Self::Go,
            "java" => Self::Java,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Self::Cpp,
            "cs" => Self::CSharp,
            "css" | "scss" => Self::Css,
            "rb" => Self::Ruby,
            "php" => Self::Php,
            "swift" => Self::Swift,
            "kt" | "kts" => Self::Kotlin,
            "html" | "htm" => Self::Html,
            "sh" | "bash" | "zsh" => Self::Shell,
            "md" | "mdx" => Self::Markdown,
            "toml" => Self::Toml,
            "yml" | "yaml" => Self::Yaml,
            "json" | "jsonc" => Self::Json,
            _ => Self::Unknown,
        }
    }

    /// Returns the language identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Css => "css",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Html => "html",
            Self::Shell => "shell",
            Self::Markdown => "markdown",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true if this is an AST-parseable programming language.
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            Self::Python
                | Self::TypeScript
                | Self::JavaScript
                | Self::Rust
                | Self::Go
                | Self::Java
                | Self::C
                | Self::Cpp
                | Self::CSharp
                | Self::Css
                | Self::Ruby
                | Self::Php
                | Self::Swift
                | Self::Kotlin
        )
    }

    /// Returns true if this is a documentation or config format.
    pub fn is_document(&self) -> bool {
        matches!(
            self,
            Self::Markdown | Self::Toml | Self::Yaml | Self::Json | Self::Html | Self::Shell
        )
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Chunk types
// ---------------------------------------------------------------------------

/// The kind of code construct a chunk represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Function or method definition.
    Function,
    /// Class, struct, or record definition.
    Class,
    /// Trait, interface, or protocol definition.
    Trait,
    /// Implementation block (Rust `impl`, Java anonymous class, etc.).
    Impl,
    /// Constant or static variable.
    Const,
    /// Type alias or definition.
    TypeDef,
    /// Module or namespace declaration, or a documentation section.
    Module,
    /// Test function or test block.
    Test,
    /// Top-level statements that don't fit other categories.
    TopLevel,
    /// A line-range slice produced by the fallback or refine splitter.
    Block,
    /// The entire file, emitted when no whitelist node matched.
    File,
}

impl ChunkKind {
    /// Returns the default structural importance weight for this kind.
    pub fn default_weight(&self) -> f64 {
        match self {
            Self::Function => 0.85,
            Self::Class => 0.95,
            Self::Trait => 0.95,
            Self::Impl => 0.85,
            Self::Const => 0.70,
            Self::TypeDef => 0.90,
            Self::Module => 0.60,
            Self::Test => 0.60,
            Self::TopLevel => 0.50,
            Self::Block => 0.40,
            Self::File => 0.30,
        }
    }

    /// Convert to the string stored in the chunk's `chunk_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Trait => "trait",
            Self::Impl => "impl",
            Self::Const => "const",
            Self::TypeDef => "typedef",
            Self::Module => "module",
            Self::Test => "test",
            Self::TopLevel => "top_level",
            Self::Block => "block",
            Self::File => "file",
        }
    }

    /// Parse from the string stored in the chunk's `chunk_type` column.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "function" => Self::Function,
            "class" => Self::Class,
            "trait" => Self::Trait,
            "impl" => Self::Impl,
            "const" => Self::Const,
            "typedef" => Self::TypeDef,
            "module" => Self::Module,
            "test" => Self::Test,
            "block" => Self::Block,
            "file" => Self::File,
            _ => Self::TopLevel,
        }
    }
}

/// Visibility of a code symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Accessible from outside the module/crate.
    Public,
    /// Accessible only within the current crate/package.
    Crate,
    /// Accessible from parent class or subclasses.
    Protected,
    /// Accessible only within the defining scope.
    Private,
}

impl Visibility {
    /// Convert to database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Crate => "crate",
            Self::Protected => "protected",
            Self::Private => "private",
        }
    }

    /// Parse from database string.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "public" => Self::Public,
            "crate" => Self::Crate,
            "protected" => Self::Protected,
            _ => Self::Private,
        }
    }
}

/// A contiguous line range within a file, 1-indexed and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// First line of the chunk (1-indexed).
    pub start_line: u32,
    /// Last line of the chunk (1-indexed, inclusive).
    pub end_line: u32,
    /// Byte offset of the chunk's start within the file, if tracked.
    pub start_char: Option<usize>,
    /// Byte offset of the chunk's end within the file, if tracked.
    pub end_char: Option<usize>,
}

impl SourceLocation {
    /// A location spanning the given line range with no character offsets.
    pub fn lines(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
            start_char: None,
            end_char: None,
        }
    }
}

/// A semantically meaningful, bounded-size chunk of a source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Raw source text of this chunk.
    pub content: String,
    /// Line (and optionally byte) range this chunk covers in its file.
    pub location: SourceLocation,
    /// What kind of code construct this chunk represents.
    pub chunk_type: ChunkKind,
    /// Free-form metadata: `function_name`, `class_name`, `symbol_path`,
    /// `doc_comment`, `visibility`, and any store-specific fields.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// Deterministic chunk identity used as the store's document id.
    ///
    /// Computed from `(file_path, start_line, end_line)` so upserts are
    /// idempotent across runs as long as the chunk's boundaries don't move.
    pub fn id(&self, relative_path: &std::path::Path) -> String {
        chunk_id(relative_path, self.location.start_line, self.location.end_line)
    }
}

/// Compute the deterministic store id for a chunk at `(path, start, end)`.
///
/// A base64url encoding of a colon-joined canonical key; stable across runs
/// and across store backends.
pub fn chunk_id(relative_path: &std::path::Path, start_line: u32, end_line: u32) -> String {
    let key = format!("{}:{start_line}:{end_line}", relative_path.display());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(key.as_bytes())
}

/// A [`Chunk`] enriched with an LLM-generated retrieval context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextualisedChunk {
    /// The underlying raw chunk.
    pub chunk: Chunk,
    /// Short retrieval context (2-4 sentences), possibly empty.
    pub context: String,
}

impl ContextualisedChunk {
    /// `context + "\n\n" + content` when context is non-empty, else `content`.
    pub fn contextualised_content(&self) -> String {
        if self.context.is_empty() {
            self.chunk.content.clone()
        } else {
            format!("{}\n\n{}", self.context, self.chunk.content)
        }
    }
}

/// A chunk flowing through the pipeline, with or without context.
///
/// The pipeline handles both variants uniformly via [`ChunkLike`] rather
/// than branching on which mode produced the chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineChunk {
    /// Produced by the AST chunker, not yet contextualised.
    Raw(Chunk),
    /// Produced by the contextualiser.
    Contextualised(ContextualisedChunk),
}

/// Shared view over [`PipelineChunk`] variants.
pub trait ChunkLike {
    /// The chunk's location in its source file.
    fn location(&self) -> SourceLocation;
    /// The raw source content (without any prepended context).
    fn raw_content(&self) -> &str;
    /// The text that should be embedded: contextualised content when
    /// available, else the raw content.
    fn embedding_text(&self) -> String;
    /// The chunk's structural kind.
    fn chunk_type(&self) -> ChunkKind;
    /// The chunk's free-form metadata.
    fn metadata(&self) -> &HashMap<String, String>;
}

impl ChunkLike for PipelineChunk {
    fn location(&self) -> SourceLocation {
        match self {
            Self::Raw(c) => c.location,
            Self::Contextualised(c) => c.chunk.location,
        }
    }

    fn raw_content(&self) -> &str {
        match self {
            Self::Raw(c) => &c.content,
            Self::Contextualised(c) => &c.chunk.content,
        }
    }

    fn embedding_text(&self) -> String {
        match self {
            Self::Raw(c) => c.content.clone(),
            Self::Contextualised(c) => c.contextualised_content(),
        }
    }

    fn chunk_type(&self) -> ChunkKind {
        match self {
            Self::Raw(c) => c.chunk_type,
            Self::Contextualised(c) => c.chunk.chunk_type,
        }
    }

    fn metadata(&self) -> &HashMap<String, String> {
        match self {
            Self::Raw(c) => &c.metadata,
            Self::Contextualised(c) => &c.chunk.metadata,
        }
    }
}

/// A chunk with its embedding(s), ready for upsert into the vector store.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    /// Path relative to the repository root.
    pub file_path: PathBuf,
    /// Detected language of the source file.
    pub language: Language,
    /// The chunk this embedding was computed for.
    pub chunk: PipelineChunk,
    /// Primary embedding vector (contextualised content, or code when dual).
    pub embedding: Vec<f32>,
    /// Secondary ("code") embedding vector, present only when dual embedding is on.
    pub secondary_embedding: Option<Vec<f32>>,
    /// Natural-language description from the translator, present only when dual embedding is on.
    pub natural_language_description: Option<String>,
}

// ---------------------------------------------------------------------------
// Search types
// ---------------------------------------------------------------------------

/// A search result with its store-facing document projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Store document id (the deterministic chunk id).
    pub id: String,
    /// Overall relevance score; higher is better.
    pub score: f64,
    /// The document payload surfaced to callers.
    pub document: SearchDocument,
}

/// The document projection of a search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDocument {
    /// Path of the matched file, relative to the repository root.
    pub file_path: PathBuf,
    /// Enclosing function name, if the chunk metadata carries one.
    pub function_name: Option<String>,
    /// Enclosing class name, if the chunk metadata carries one.
    pub class_name: Option<String>,
    /// First line of the match (1-indexed).
    pub start_line: u32,
    /// Last line of the match (1-indexed, inclusive).
    pub end_line: u32,
    /// Detected language of the source file.
    pub language: Language,
    /// Natural-language description, present only for dual-embedded chunks.
    pub natural_language_description: Option<String>,
    /// The chunk's raw source code.
    pub original_code: String,
    /// LLM-generated retrieval context, if contextualisation was on.
    pub context: Option<String>,
    /// Free-form scoring and provenance metadata (`original_score`,
    /// `reranking_score`, `vector_rank`, `text_rank`, `distance`, ...).
    #[serde(default)]
    pub metadata: HashMap<String, JsonValue>,
}
