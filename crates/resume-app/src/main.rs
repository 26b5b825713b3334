//! Resume index binary - composition root.
//!
//! Ties the crates together into a single executable:
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialize tracing
//! 3. Open the persisted vector store
//! 4. Select the embedding backend
//! 5. Run the requested subcommand (the API server by default)

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use resume_api::routes;
use resume_api::state::AppState;
use resume_core::config::ResumeConfig;
use resume_core::error::ResumeError;
use resume_core::skills::SkillMatcher;
use resume_vector::embedding::{DynEmbeddingService, HashEmbedding};
use resume_vector::{DocumentExtractor, InsertOutcome, IngestPipeline, SearchEngine, VectorStore};

use cli::{CliArgs, Command};

/// Build the embedding service named by the configuration.
///
/// With the `onnx` feature and `search.model_dir` set, loads the
/// sentence-transformer model; otherwise uses the deterministic hash
/// embedding of `search.embedding_dim` dimensions.
fn build_embedder(config: &ResumeConfig) -> Result<Arc<dyn DynEmbeddingService>, ResumeError> {
    #[cfg(feature = "onnx")]
    {
        if let Some(ref dir) = config.search.model_dir {
            let dir = resume_core::config::expand_home(dir);
            let service = resume_vector::onnx::OnnxEmbeddingService::from_directory(&dir)?;
            tracing::info!(model = %config.search.embedding_model, "ONNX embedding backend selected");
            return Ok(Arc::new(service));
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        if config.search.model_dir.is_some() {
            tracing::warn!(
                "search.model_dir is set but this build lacks the `onnx` feature; using hash embeddings"
            );
        }
    }

    tracing::warn!(
        dimensions = config.search.embedding_dim,
        scheme = resume_vector::embedding::HASH_EMBEDDING_SCHEME,
        "Hash embedding backend selected; search ranks by exact text, not meaning"
    );
    Ok(Arc::new(HashEmbedding::new(config.search.embedding_dim)))
}

/// Add each file to the index, reporting one line per file.
async fn ingest_files(pipeline: &IngestPipeline, files: &[PathBuf]) -> usize {
    let mut failures = 0;
    for path in files {
        let result = read_and_ingest(pipeline, path).await;
        match result {
            Ok(InsertOutcome::Inserted(meta)) => {
                println!("inserted  {} ({} skills)", meta.filename, meta.skills.len());
            }
            Ok(InsertOutcome::Duplicate(meta)) => {
                println!("duplicate {}", meta.filename);
            }
            Err(e) => {
                failures += 1;
                eprintln!("failed    {}: {}", path.display(), e);
            }
        }
    }
    failures
}

async fn read_and_ingest(
    pipeline: &IngestPipeline,
    path: &Path,
) -> Result<InsertOutcome, ResumeError> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    pipeline.ingest_document(&name, &bytes).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing so its log level can apply.
    let config_file = args.resolve_config_path();
    let (mut config, config_err) = match ResumeConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (ResumeConfig::default(), Some(e)),
    };
    args.apply_overrides(&mut config);

    // Tracing: RUST_LOG > --log-level > config.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting resume index v{}", env!("CARGO_PKG_VERSION"));
    match config_err {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config. Using defaults."
        ),
    }

    // Storage.
    let index_dir = config.index_dir();
    let store = match VectorStore::open(&index_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(path = %index_dir.display(), error = %e, "Failed to open vector store");
            return Err(e.into());
        }
    };

    let embedder = build_embedder(&config)?;

    match args.command() {
        Command::Serve { .. } => {
            let state = AppState::new(config.clone(), store, embedder);
            routes::start_server(&config, state).await?;
        }
        Command::Ingest { files } => {
            let pipeline = IngestPipeline::new(store, embedder)
                .with_extractor(Arc::new(DocumentExtractor::new()))
                .with_skills(SkillMatcher::new(&config.skills.extra))
                .with_upload_dir(config.upload_dir());
            let failures = ingest_files(&pipeline, &files).await;
            if failures > 0 {
                return Err(format!("{} of {} files failed", failures, files.len()).into());
            }
        }
        Command::Search { query, top_k } => {
            let engine = SearchEngine::new(store, embedder);
            let hits = engine
                .search(&query, config.effective_top_k(top_k))
                .await?;
            let body = serde_json::json!({ "query": query, "results": hits });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&store.stats()?)?);
        }
    }

    Ok(())
}
