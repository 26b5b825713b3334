//! Search engine combining query embedding with a store scan.
//!
//! SearchEngine embeds the query text with the same [`DynEmbeddingService`]
//! used at ingest time and asks the [`VectorStore`] for its nearest entries.

use std::sync::Arc;

use tracing::debug;

use resume_core::error::{ResumeError, Result};

use crate::embedding::DynEmbeddingService;
use crate::store::{QueryHit, VectorStore};

/// Query-side counterpart of [`IngestPipeline`](crate::pipeline::IngestPipeline).
pub struct SearchEngine {
    store: Arc<VectorStore>,
    embedder: Arc<dyn DynEmbeddingService>,
}

impl SearchEngine {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn DynEmbeddingService>) -> Self {
        Self { store, embedder }
    }

    /// Embed `query` and return up to `top_k` nearest entries, closest first.
    ///
    /// Blank queries are rejected before any embedding work.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResumeError::InvalidInput(
                "search query must not be empty".to_string(),
            ));
        }

        let query_vec = self.embedder.embed_boxed(query).await?;

        let store = Arc::clone(&self.store);
        let hits = tokio::task::spawn_blocking(move || store.query(&query_vec, top_k))
            .await
            .map_err(|e| ResumeError::Storage(format!("Query task panicked: {}", e)))??;

        debug!(top_k, returned = hits.len(), "Search completed");
        Ok(hits)
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }
}
