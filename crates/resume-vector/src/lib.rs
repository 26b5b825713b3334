//! Resume Vector crate - persisted embedding store, embedding services, and
//! the ingest/search pipelines built on them.
//!
//! The [`VectorStore`] holds (embedding, metadata) pairs, persists every
//! accepted insert atomically, and answers brute-force nearest-neighbour
//! queries. Embedding generation sits behind [`EmbeddingService`]; a
//! deterministic [`HashEmbedding`] is always available and an ONNX
//! sentence-transformer backend is enabled with the `onnx` feature.

pub mod embedding;
pub mod extract;
#[cfg(feature = "onnx")]
pub mod onnx;
mod persist;
pub mod pipeline;
pub mod search;
pub mod store;

pub use embedding::{DynEmbeddingService, EmbeddingService, HashEmbedding};
pub use extract::{DocumentExtractor, PdfExtractor, PlainTextExtractor, TextExtractor};
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbeddingService;
pub use pipeline::IngestPipeline;
pub use search::SearchEngine;
pub use store::{InsertOutcome, QueryHit, StoreStats, VectorStore};
