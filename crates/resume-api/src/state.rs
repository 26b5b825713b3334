//! Application state shared across all route handlers.
//!
//! AppState is built once at startup and passed to handlers via axum's
//! State extractor.

use std::sync::Arc;
use std::time::Instant;

use resume_core::config::ResumeConfig;
use resume_core::skills::SkillMatcher;
use resume_vector::embedding::DynEmbeddingService;
use resume_vector::{DocumentExtractor, IngestPipeline, SearchEngine, VectorStore};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. The store
/// does its own locking, so nothing here needs a `Mutex`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed for the life of the server.
    pub config: Arc<ResumeConfig>,
    /// Persisted vector store.
    pub store: Arc<VectorStore>,
    /// Upload pipeline (extract + skills + embed + insert).
    pub pipeline: Arc<IngestPipeline>,
    /// Query-side search engine.
    pub search_engine: Arc<SearchEngine>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire the pipeline and search engine around one store and embedder.
    pub fn new(
        config: ResumeConfig,
        store: Arc<VectorStore>,
        embedder: Arc<dyn DynEmbeddingService>,
    ) -> Self {
        let pipeline = IngestPipeline::new(Arc::clone(&store), Arc::clone(&embedder))
            .with_extractor(Arc::new(DocumentExtractor::new()))
            .with_skills(SkillMatcher::new(&config.skills.extra))
            .with_upload_dir(config.upload_dir());
        let search_engine = SearchEngine::new(Arc::clone(&store), embedder);

        Self {
            config: Arc::new(config),
            store,
            pipeline: Arc::new(pipeline),
            search_engine: Arc::new(search_engine),
            start_time: Instant::now(),
        }
    }
}
