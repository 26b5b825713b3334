//! Document ingestion pipeline.
//!
//! Processes an uploaded document through:
//! 1. Filename sanitization and an early duplicate check
//! 2. Raw upload staging under a private name
//! 3. Text extraction
//! 4. Skill matching and length measurement
//! 5. Embedding generation
//! 6. Store insertion, then the staged upload is kept or discarded

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use resume_core::error::{ResumeError, Result};
use resume_core::filename::sanitize_filename;
use resume_core::skills::SkillMatcher;
use resume_core::types::Metadata;

use crate::embedding::DynEmbeddingService;
use crate::extract::{DocumentExtractor, TextExtractor};
use crate::store::{InsertOutcome, VectorStore};

static STAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Upload-side pipeline: document bytes in, store entry out.
pub struct IngestPipeline {
    store: Arc<VectorStore>,
    embedder: Arc<dyn DynEmbeddingService>,
    extractor: Arc<dyn TextExtractor>,
    skills: SkillMatcher,
    upload_dir: Option<PathBuf>,
}

impl IngestPipeline {
    /// Create a pipeline with the PDF/plain-text [`DocumentExtractor`] and
    /// the built-in skills vocabulary. Raw uploads are not retained until
    /// [`with_upload_dir`](Self::with_upload_dir) is set.
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn DynEmbeddingService>) -> Self {
        Self {
            store,
            embedder,
            extractor: Arc::new(DocumentExtractor::new()),
            skills: SkillMatcher::default(),
            upload_dir: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_skills(mut self, skills: SkillMatcher) -> Self {
        self.skills = skills;
        self
    }

    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = Some(dir.into());
        self
    }

    /// Ingest one uploaded document.
    ///
    /// A filename already in the store short-circuits to `Duplicate` before
    /// any extraction or embedding work. The store repeats the check under
    /// its write lock, so concurrent uploads of one name still store it once.
    ///
    /// With an upload directory set, the raw bytes land at
    /// `upload_dir/<filename>` only when this call inserted the entry; a
    /// duplicate or failed upload never replaces the file of the stored one.
    pub async fn ingest_document(&self, raw_filename: &str, bytes: &[u8]) -> Result<InsertOutcome> {
        let filename = sanitize_filename(raw_filename);
        if filename.is_empty() {
            return Err(ResumeError::InvalidInput(format!(
                "filename {:?} is empty after sanitization",
                raw_filename
            )));
        }

        if let Some(existing) = self.store.get(&filename) {
            debug!(filename = %filename, "Upload matches an existing entry");
            return Ok(InsertOutcome::Duplicate(existing));
        }

        let staged = match self.upload_dir {
            Some(ref dir) => Some(StagedUpload::write(dir, &filename, bytes).await?),
            None => None,
        };

        let outcome = self.extract_and_insert(&filename, bytes).await?;

        if let InsertOutcome::Inserted(ref meta) = outcome {
            if let Some(staged) = staged {
                // The entry is committed; a lost raw copy is not worth failing the upload.
                if let Err(e) = staged.keep().await {
                    warn!(filename = %meta.filename, error = %e, "Failed to retain raw upload");
                }
            }
            info!(
                filename = %meta.filename,
                skills = meta.skills.len(),
                length = meta.length,
                "Document ingested"
            );
        }

        Ok(outcome)
    }

    async fn extract_and_insert(&self, filename: &str, bytes: &[u8]) -> Result<InsertOutcome> {
        let extractor = Arc::clone(&self.extractor);
        let name = filename.to_string();
        let owned = bytes.to_vec();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&name, &owned))
            .await
            .map_err(|e| ResumeError::Extraction(format!("Extraction task panicked: {}", e)))??;

        if text.trim().is_empty() {
            return Err(ResumeError::InvalidInput(format!(
                "no text could be extracted from {}",
                filename
            )));
        }

        let metadata = self.describe(filename, &text);
        let embedding = self.embedder.embed_boxed(&text).await?;

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.insert(embedding, metadata))
            .await
            .map_err(|e| ResumeError::Storage(format!("Insert task panicked: {}", e)))?
    }

    /// Build the metadata record for extracted text.
    pub fn describe(&self, filename: &str, text: &str) -> Metadata {
        Metadata::new(
            filename,
            self.skills.extract(text),
            text.chars().count() as u64,
        )
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &VectorStore {
        &self.store
    }
}

/// Raw upload written under a hidden per-call name in the upload directory.
///
/// Removed on drop unless [`keep`](Self::keep) moved it to its final name.
struct StagedUpload {
    path: PathBuf,
    target: PathBuf,
    kept: bool,
}

impl StagedUpload {
    async fn write(dir: &Path, filename: &str, bytes: &[u8]) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let seq = STAGE_SEQ.fetch_add(1, Ordering::Relaxed);
        let staged = Self {
            path: dir.join(format!(".{}.{}-{}.part", filename, std::process::id(), seq)),
            target: dir.join(filename),
            kept: false,
        };
        tokio::fs::write(&staged.path, bytes).await?;
        Ok(staged)
    }

    async fn keep(mut self) -> Result<()> {
        tokio::fs::rename(&self.path, &self.target).await?;
        self.kept = true;
        Ok(())
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove staged upload");
            }
        }
    }
}
