//! Embedding provider trait and the built-in hash backend.
//!
//! - `HashEmbedding` produces deterministic hash-derived unit vectors. It is
//!   the default backend and the one every test uses.
//! - `OnnxEmbeddingService` (feature `onnx`, see [`crate::onnx`]) runs a
//!   sentence-transformer model such as all-MiniLM-L6-v2.
//!
//! The store never calls a provider itself; callers embed first and then hand
//! the vector to `VectorStore::insert` or `VectorStore::query`.

use std::future::Future;
use std::pin::Pin;

use sha2::{Digest, Sha256};

use resume_core::error::ResumeError;

/// Service for generating text embeddings.
///
/// Implementations must be deterministic for identical input and always
/// return vectors of `dimensions()` components.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, ResumeError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService::embed` returns `impl Future`, which is not object-safe.
/// Every `EmbeddingService` gets this trait through the blanket impl below, so
/// the API state can hold `Arc<dyn DynEmbeddingService>` for either backend.
pub trait DynEmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, ResumeError>> + Send + 'a>>;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, ResumeError>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

// ---------------------------------------------------------------------------
// HashEmbedding - deterministic hash-based vectors
// ---------------------------------------------------------------------------

/// Domain tag mixed into every digest. Changing the derivation means changing
/// this tag, since stored vectors from the old scheme stop matching queries.
pub const HASH_EMBEDDING_SCHEME: &str = "resume-hash-v1";

/// Embedding service that derives a unit vector from SHA-256 digests of the
/// input.
///
/// Identical inputs always produce identical outputs, across builds and
/// platforms, which is enough to exercise duplicate handling, ranking and
/// persistence without a model. The vectors carry no semantic similarity.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimensions: usize,
}

impl HashEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Four little-endian words of `SHA-256(scheme || 0 || text || block)`.
    fn block_words(text: &str, block: u64) -> [u64; 4] {
        let digest = Sha256::new()
            .chain_update(HASH_EMBEDDING_SCHEME.as_bytes())
            .chain_update([0u8])
            .chain_update(text.as_bytes())
            .chain_update(block.to_le_bytes())
            .finalize();

        let mut words = [0u64; 4];
        for (word, chunk) in words.iter_mut().zip(digest.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_le_bytes(bytes);
        }
        words
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.dimensions);
        let mut block = 0u64;
        while result.len() < self.dimensions {
            for h in Self::block_words(text, block) {
                if result.len() == self.dimensions {
                    break;
                }
                let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
                result.push(val as f32);
            }
            block += 1;
        }

        // Unit length, matching the ONNX backend's normalized output.
        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingService for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ResumeError> {
        if text.is_empty() {
            return Err(ResumeError::Embedding("Cannot embed empty text".to_string()));
        }
        if self.dimensions == 0 {
            return Err(ResumeError::Embedding(
                "Embedding dimension must be positive".to_string(),
            ));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
