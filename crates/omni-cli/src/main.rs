//! OmniContext CLI.
//!
//! Thin command-line surface over `omni_core::Engine`: `sync`, `batch`,
//! `search`, `purge`, `stats`. Exit code `0` on success, `1` on failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use omni_core::config::Config;
use omni_core::pipeline::{BatchOptions, Engine, IndexOptions, SearchOptions};
use omni_core::types::Language;

/// OmniContext - Universal Code Context Engine
#[derive(Parser, Debug)]
#[command(name = "omnicontext", version, about = "Universal code context engine for AI coding agents")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Log level (passed to the `tracing` env filter).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Named config preset to resolve on top of the layered defaults.
    #[arg(long, global = true)]
    config_name: Option<String>,

    /// Override the vector-store backend (`sql` or `managed`).
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Override the datastore/partition id the backend writes to.
    #[arg(long, global = true)]
    datastore_id: Option<String>,

    /// Resolve the run's effective config and report what would happen,
    /// without performing it.
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Full or incremental index of a repository.
    Sync {
        /// Path to the repository root.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Use Merkle-based change detection instead of a full reindex.
        #[arg(long)]
        incremental: bool,

        /// Restrict indexing to a sub-directory of the repository.
        #[arg(long)]
        sub_folder: Option<PathBuf>,
    },

    /// Resumable batch index, checkpointed to a JSONL state file.
    Batch {
        /// Path to the repository root.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Checkpoint file to read/write.
        #[arg(long, default_value = ".omnicontext/batch-state.jsonl")]
        state_file: PathBuf,

        /// Bounded per-file concurrency.
        #[arg(long, default_value_t = 15)]
        concurrency: usize,

        /// Keep going past a file-level failure instead of aborting the run.
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Search the indexed codebase.
    Search {
        /// Search query (natural language or keywords).
        query: String,

        /// Repository root the index was built for.
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Keep only results whose file path contains this substring.
        #[arg(long)]
        file: Option<String>,

        /// Filter by programming language.
        #[arg(long)]
        language: Option<String>,

        /// Force reranking on or off, overriding the config default.
        #[arg(long)]
        rerank: Option<bool>,
    },

    /// Delete every indexed chunk for the repository's `config_name`.
    Purge {
        /// Path to the repository root.
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Print store statistics for the repository's index.
    Stats {
        /// Path to the repository root.
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_env_filter(&cli.log_level).init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.clone() {
        Commands::Sync { path, incremental, sub_folder } => {
            let config = resolve_config(&path, &cli)?;
            if cli.dry_run {
                println!(
                    "would sync {} (incremental={incremental}, backend={:?})",
                    path.display(),
                    config.backend
                );
                return Ok(());
            }

            let mut engine = Engine::with_config(config)?;
            let options = IndexOptions {
                sub_folder,
                incremental,
                config: None,
            };
            let stats = engine.index_repository(&path, options, None).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            if !stats.failed_files.is_empty() {
                anyhow::bail!("{} file(s) failed to index", stats.failed_files.len());
            }
            Ok(())
        }

        Commands::Batch {
            path,
            state_file,
            concurrency,
            continue_on_error,
        } => {
            let config = resolve_config(&path, &cli)?;
            if cli.dry_run {
                println!("would batch-sync {} (state_file={})", path.display(), state_file.display());
                return Ok(());
            }

            let mut engine = Engine::with_config(config)?;
            let options = BatchOptions {
                state_file_path: state_file,
                concurrency,
                continue_on_error,
                config: None,
            };
            let stats = engine.index_repository_batch(&path, options, None).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            if !stats.failed_files.is_empty() {
                anyhow::bail!("{} file(s) failed to index", stats.failed_files.len());
            }
            Ok(())
        }

        Commands::Search {
            query,
            path,
            limit,
            file,
            language,
            rerank,
        } => {
            let config = resolve_config(&path, &cli)?;
            if cli.dry_run {
                println!("would search {:?} against {}", query, path.display());
                return Ok(());
            }

            let language_filter = language.map(|name| parse_language(&name)).transpose()?;
            let engine = Engine::with_config(config)?;
            let options = SearchOptions {
                max_results: limit,
                file_filter: file,
                language_filter,
                hybrid_search: None,
                reranking: rerank,
            };
            let results = engine.search(&query, options).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }

        Commands::Purge { path } => {
            let config = resolve_config(&path, &cli)?;
            if cli.dry_run {
                println!("would purge index for {}", path.display());
                return Ok(());
            }

            let engine = Engine::with_config(config)?;
            engine.purge_all().await?;
            println!("purged");
            Ok(())
        }

        Commands::Stats { path } => {
            let config = resolve_config(&path, &cli)?;
            let engine = Engine::with_config(config)?;
            let stats = engine.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

/// Resolve the layered config for `path`, then apply the CLI's override flags.
fn resolve_config(path: &std::path::Path, cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(path, cli.config_name.as_deref())?;

    if let Some(backend) = &cli.backend {
        config.backend = parse_backend(backend)?;
    }
    if let Some(datastore_id) = &cli.datastore_id {
        apply_datastore_id(&mut config, datastore_id);
    }

    Ok(config)
}

fn parse_backend(name: &str) -> anyhow::Result<omni_core::config::BackendConfig> {
    use omni_core::config::{BackendConfig, ManagedBackendConfig, SqlBackendConfig};

    match name {
        "sql" => Ok(BackendConfig::Sql(SqlBackendConfig::default())),
        "managed" => Ok(BackendConfig::Managed(ManagedBackendConfig::default())),
        other => anyhow::bail!("unknown backend override {other:?}, expected \"sql\" or \"managed\""),
    }
}

fn apply_datastore_id(config: &mut Config, datastore_id: &str) {
    use omni_core::config::BackendConfig;

    match &mut config.backend {
        BackendConfig::Sql(sql) => sql.database = datastore_id.to_string(),
        BackendConfig::Managed(managed) => managed.datastore_id = Some(datastore_id.to_string()),
    }
}

fn parse_language(name: &str) -> anyhow::Result<Language> {
    const LANGUAGES: &[Language] = &[
        Language::Python,
        Language::TypeScript,
        Language::JavaScript,
        Language::Rust,
        Language::Go,
        Language::Java,
        Language::C,
        Language::Cpp,
        Language::CSharp,
        Language::Css,
        Language::Ruby,
        Language::Php,
        Language::Swift,
        Language::Kotlin,
        Language::Html,
        Language::Shell,
        Language::Markdown,
        Language::Toml,
        Language::Yaml,
        Language::Json,
    ];

    let lowered = name.to_lowercase();
    LANGUAGES
        .iter()
        .copied()
        .find(|lang| lang.as_str() == lowered)
        .ok_or_else(|| anyhow::anyhow!("unknown language {name:?}"))
}
