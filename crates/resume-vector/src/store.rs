//! Persisted vector index store with brute-force k-nearest-neighbor search.
//!
//! The store keeps two parallel, append-only sequences (embeddings and their
//! metadata) and persists every insert as a new generation on disk (see
//! [`crate::persist`]). Search is an exact linear scan over squared
//! Euclidean distance.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use resume_core::error::{ResumeError, Result};
use resume_core::types::Metadata;

use crate::persist::{self, Manifest, FORMAT_VERSION};

/// Result of a successful `insert` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertOutcome {
    /// The entry was appended and persisted.
    Inserted(Metadata),
    /// An entry with the same filename already exists; nothing changed.
    Duplicate(Metadata),
}

impl InsertOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, InsertOutcome::Duplicate(_))
    }

    /// The new metadata for `Inserted`, the pre-existing one for `Duplicate`.
    pub fn metadata(&self) -> &Metadata {
        match self {
            InsertOutcome::Inserted(m) | InsertOutcome::Duplicate(m) => m,
        }
    }
}

/// A single hit returned from a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    pub metadata: Metadata,
    /// Squared Euclidean distance to the query embedding.
    pub distance: f32,
}

/// Point-in-time summary of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: usize,
    pub dimension: Option<usize>,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    generation: u64,
    /// Fixed by the first insert; `None` while the store is empty.
    dimension: Option<usize>,
    /// Row-major, `metadata.len() * dimension` values.
    vectors: Vec<f32>,
    metadata: Vec<Metadata>,
    by_filename: HashMap<String, usize>,
}

/// Durable, append-only collection of (embedding, metadata) pairs.
///
/// Thread-safe via an interior `RwLock`: `insert` holds the write lock for
/// its whole read-modify-persist cycle, `query` holds the read lock, so
/// queries run in parallel and never see a half-applied insert.
#[derive(Debug)]
pub struct VectorStore {
    dir: PathBuf,
    state: RwLock<StoreState>,
}

impl VectorStore {
    /// Open the store in `dir`, creating the directory if needed.
    ///
    /// Fails with `CorruptState` when the persisted embeddings and metadata
    /// disagree; the directory is left untouched in that case.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let loaded = persist::load(&dir)?;
        let by_filename = loaded
            .metadata
            .iter()
            .enumerate()
            .map(|(i, m)| (m.filename.clone(), i))
            .collect();

        info!(
            dir = %dir.display(),
            generation = loaded.generation,
            entries = loaded.metadata.len(),
            dimension = ?loaded.dimension,
            "Vector store opened"
        );

        Ok(Self {
            dir,
            state: RwLock::new(StoreState {
                generation: loaded.generation,
                dimension: loaded.dimension,
                vectors: loaded.vectors,
                metadata: loaded.metadata,
                by_filename,
            }),
        })
    }

    /// Append an entry, unless its filename is already present.
    ///
    /// The new entry is visible to readers only after both collection files
    /// and the manifest of the next generation are on disk. If persisting
    /// fails, the store keeps its previous state and the error is returned.
    pub fn insert(&self, embedding: Vec<f32>, metadata: Metadata) -> Result<InsertOutcome> {
        if metadata.filename.is_empty() {
            return Err(ResumeError::InvalidInput(
                "metadata filename must not be empty".to_string(),
            ));
        }
        if embedding.is_empty() {
            return Err(ResumeError::InvalidInput(
                "embedding must not be empty".to_string(),
            ));
        }

        let mut state = self.write_state();

        if let Some(&pos) = state.by_filename.get(&metadata.filename) {
            debug!(filename = %metadata.filename, position = pos, "Duplicate filename, insert skipped");
            return Ok(InsertOutcome::Duplicate(state.metadata[pos].clone()));
        }

        let dimension = embedding.len();
        if let Some(expected) = state.dimension {
            if dimension != expected {
                return Err(ResumeError::DimensionMismatch {
                    expected,
                    actual: dimension,
                });
            }
        }

        let previous = state.generation;
        let next = previous + 1;
        let entries = state.metadata.len() + 1;

        if let Err(e) = self.persist_next(&state, next, dimension, &embedding, &metadata) {
            warn!(generation = next, error = %e, "Insert not committed");
            if let Err(cleanup) = persist::discard_generation(&self.dir, next) {
                warn!(generation = next, error = %cleanup, "Failed to remove staged files");
            }
            return Err(e);
        }

        state.vectors.extend_from_slice(&embedding);
        state.by_filename.insert(metadata.filename.clone(), entries - 1);
        state.metadata.push(metadata.clone());
        state.dimension = Some(dimension);
        state.generation = next;
        drop(state);

        if previous > 0 {
            if let Err(e) = persist::discard_generation(&self.dir, previous) {
                warn!(generation = previous, error = %e, "Failed to remove superseded generation");
            }
        }

        info!(
            filename = %metadata.filename,
            generation = next,
            entries,
            "Entry inserted"
        );

        Ok(InsertOutcome::Inserted(metadata))
    }

    fn persist_next(
        &self,
        state: &StoreState,
        generation: u64,
        dimension: usize,
        embedding: &[f32],
        metadata: &Metadata,
    ) -> Result<()> {
        let all_metadata: Vec<&Metadata> =
            state.metadata.iter().chain(std::iter::once(metadata)).collect();

        persist::stage_generation(
            &self.dir,
            generation,
            dimension,
            &[state.vectors.as_slice(), embedding],
            &all_metadata,
        )?;

        persist::commit_manifest(
            &self.dir,
            &Manifest {
                format_version: FORMAT_VERSION,
                generation,
                entries: all_metadata.len() as u64,
                dimension,
                committed_at: Utc::now(),
            },
        )
    }

    /// Return the `top_k` entries nearest to `embedding`, closest first.
    ///
    /// Distance is squared Euclidean. Equal distances keep insertion order.
    /// An empty store yields no hits regardless of the query width.
    pub fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<QueryHit>> {
        let state = self.read_state();

        let Some(dimension) = state.dimension else {
            return Ok(Vec::new());
        };
        if embedding.len() != dimension {
            return Err(ResumeError::DimensionMismatch {
                expected: dimension,
                actual: embedding.len(),
            });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = state
            .vectors
            .chunks_exact(dimension)
            .map(|row| squared_euclidean(embedding, row))
            .enumerate()
            .collect();

        let k = top_k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_by(rank_order);

        debug!(entries = state.metadata.len(), top_k, returned = k, "Query scanned");

        Ok(scored
            .into_iter()
            .map(|(pos, distance)| QueryHit {
                metadata: state.metadata[pos].clone(),
                distance,
            })
            .collect())
    }

    /// Look up an entry's metadata by filename.
    pub fn get(&self, filename: &str) -> Option<Metadata> {
        let state = self.read_state();
        state
            .by_filename
            .get(filename)
            .map(|&pos| state.metadata[pos].clone())
    }

    /// Return the number of entries currently stored.
    pub fn len(&self) -> usize {
        self.read_state().metadata.len()
    }

    /// Return true if the store contains no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The fixed embedding width, once the first entry is stored.
    pub fn dimension(&self) -> Option<usize> {
        self.read_state().dimension
    }

    /// The committed on-disk generation; 0 for a store that was never written.
    pub fn generation(&self) -> u64 {
        self.read_state().generation
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.read_state();
        Ok(StoreStats {
            entries: state.metadata.len(),
            dimension: state.dimension,
            generation: state.generation,
        })
    }

    /// Directory holding the persisted store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Insert mutates the state only after the commit, in steps that cannot
    // fail, so a guard recovered from a poisoned lock sees consistent data.
    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| {
            warn!("Store lock poisoned by a panicked holder; continuing");
            PoisonError::into_inner(e)
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| {
            warn!("Store lock poisoned by a panicked holder; continuing");
            PoisonError::into_inner(e)
        })
    }
}

/// Ascending distance, then ascending ordinal.
fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0))
}

/// Squared Euclidean distance between two vectors of equal length.
fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{metadata_file, vectors_file, MANIFEST_FILE};
    use std::sync::Arc;

    fn meta(name: &str) -> Metadata {
        Metadata::new(name, vec!["Rust".to_string()], name.len() as u64)
    }

    fn open_temp() -> (tempfile::TempDir, VectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn filenames(hits: &[QueryHit]) -> Vec<&str> {
        hits.iter().map(|h| h.metadata.filename.as_str()).collect()
    }

    #[test]
    fn test_open_empty_directory() {
        let (_dir, store) = open_temp();
        assert!(store.is_empty());
        assert_eq!(store.dimension(), None);
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_append_monotonicity() {
        let (dir, store) = open_temp();
        for i in 0..5 {
            let outcome = store
                .insert(vec![i as f32, 0.0], meta(&format!("cv{}.pdf", i)))
                .unwrap();
            assert!(!outcome.is_duplicate());
            assert_eq!(store.len(), i + 1);
        }

        let loaded = persist::load(dir.path()).unwrap();
        assert_eq!(loaded.metadata.len(), 5);
        assert_eq!(loaded.vectors.len() / 2, 5);
        assert_eq!(store.generation(), 5);
    }

    #[test]
    fn test_duplicate_is_idempotent() {
        let (_dir, store) = open_temp();
        let original = meta("alice.pdf");
        store.insert(vec![1.0, 2.0], original.clone()).unwrap();

        let different = Metadata::new("alice.pdf", vec!["Go".into()], 999);
        let outcome = store.insert(vec![9.0, 9.0], different).unwrap();

        assert_eq!(outcome, InsertOutcome::Duplicate(original.clone()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.generation(), 1);
        assert_eq!(store.get("alice.pdf"), Some(original));

        let hits = store.query(&[1.0, 2.0], 5).unwrap();
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn test_duplicate_checked_before_dimension() {
        let (_dir, store) = open_temp();
        store.insert(vec![1.0, 2.0], meta("a.pdf")).unwrap();
        let outcome = store.insert(vec![1.0, 2.0, 3.0], meta("a.pdf")).unwrap();
        assert!(outcome.is_duplicate());
    }

    #[test]
    fn test_insert_dimension_guard() {
        let (_dir, store) = open_temp();
        store.insert(vec![1.0, 2.0], meta("a.pdf")).unwrap();

        let err = store.insert(vec![1.0, 2.0, 3.0], meta("b.pdf")).unwrap_err();
        assert!(matches!(
            err,
            ResumeError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(store.generation(), 1);
        assert!(store.get("b.pdf").is_none());
    }

    #[test]
    fn test_query_dimension_guard() {
        let (_dir, store) = open_temp();
        store.insert(vec![1.0, 2.0], meta("a.pdf")).unwrap();
        let err = store.query(&[1.0], 3).unwrap_err();
        assert!(matches!(err, ResumeError::DimensionMismatch { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalid_input_rejected() {
        let (_dir, store) = open_temp();
        assert!(matches!(
            store.insert(vec![1.0], meta("")),
            Err(ResumeError::InvalidInput(_))
        ));
        assert!(matches!(
            store.insert(Vec::new(), meta("a.pdf")),
            Err(ResumeError::InvalidInput(_))
        ));
        assert!(store.is_empty());
        assert_eq!(store.dimension(), None);
    }

    #[test]
    fn test_ranking_correctness() {
        let (_dir, store) = open_temp();
        store.insert(vec![0.0, 0.0], meta("entry0")).unwrap();
        store.insert(vec![1.0, 0.0], meta("entry1")).unwrap();
        store.insert(vec![5.0, 5.0], meta("entry2")).unwrap();

        let hits = store.query(&[0.0, 0.0], 2).unwrap();
        assert_eq!(filenames(&hits), vec!["entry0", "entry1"]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].distance, 1.0);
    }

    #[test]
    fn test_top_k_clamped_to_store_size() {
        let (_dir, store) = open_temp();
        store.insert(vec![5.0, 5.0], meta("far")).unwrap();
        store.insert(vec![0.0, 1.0], meta("near")).unwrap();
        store.insert(vec![2.0, 0.0], meta("mid")).unwrap();

        let hits = store.query(&[0.0, 0.0], 100).unwrap();
        assert_eq!(filenames(&hits), vec!["near", "mid", "far"]);
        assert_eq!(hits[2].distance, 50.0);
    }

    #[test]
    fn test_ties_broken_by_insertion_order() {
        let (_dir, store) = open_temp();
        store.insert(vec![0.0, 3.0], meta("first")).unwrap();
        store.insert(vec![3.0, 0.0], meta("second")).unwrap();
        store.insert(vec![0.0, -3.0], meta("third")).unwrap();
        store.insert(vec![-3.0, 0.0], meta("fourth")).unwrap();

        let hits = store.query(&[0.0, 0.0], 2).unwrap();
        assert_eq!(filenames(&hits), vec!["first", "second"]);

        let all = store.query(&[0.0, 0.0], 4).unwrap();
        assert_eq!(filenames(&all), vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn test_empty_store_query() {
        let (_dir, store) = open_temp();
        assert!(store.query(&[1.0, 2.0], 3).unwrap().is_empty());
        assert!(store.query(&[1.0], 0).unwrap().is_empty());
        assert!(store.query(&[], 10).unwrap().is_empty());
    }

    #[test]
    fn test_top_k_zero() {
        let (_dir, store) = open_temp();
        store.insert(vec![1.0], meta("a.pdf")).unwrap();
        assert!(store.query(&[1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_superseded_generation_removed() {
        let (dir, store) = open_temp();
        store.insert(vec![1.0], meta("a.pdf")).unwrap();
        store.insert(vec![2.0], meta("b.pdf")).unwrap();

        assert!(!dir.path().join(vectors_file(1)).exists());
        assert!(!dir.path().join(metadata_file(1)).exists());
        assert!(dir.path().join(vectors_file(2)).exists());
        assert!(dir.path().join(metadata_file(2)).exists());
        assert!(dir.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_failed_persist_leaves_state_unchanged() {
        let (dir, store) = open_temp();
        store.insert(vec![1.0, 1.0], meta("a.pdf")).unwrap();

        // A directory squatting on the next generation's vector file makes
        // staging fail.
        std::fs::create_dir(dir.path().join(vectors_file(2))).unwrap();

        let result = store.insert(vec![2.0, 2.0], meta("b.pdf"));
        assert!(result.is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.generation(), 1);
        assert!(store.get("b.pdf").is_none());

        std::fs::remove_dir(dir.path().join(vectors_file(2))).unwrap();
        drop(store);

        let reopened = VectorStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        reopened.insert(vec![2.0, 2.0], meta("b.pdf")).unwrap();
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn test_concurrent_inserts_and_queries() {
        let (dir, store) = open_temp();
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for t in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..5 {
                    let name = format!("t{}-{}.pdf", t, i);
                    store.insert(vec![t as f32, i as f32], meta(&name)).unwrap();
                    let hits = store.query(&[0.0, 0.0], 3).unwrap();
                    assert!(!hits.is_empty() && hits.len() <= 3);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 40);
        assert_eq!(store.generation(), 40);
        let loaded = persist::load(dir.path()).unwrap();
        assert_eq!(loaded.metadata.len(), 40);
        assert_eq!(loaded.vectors.len(), 80);
    }

    #[test]
    fn test_concurrent_duplicate_inserts_store_once() {
        let (_dir, store) = open_temp();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.insert(vec![1.0, 1.0], meta("same.pdf")).unwrap())
            })
            .collect();

        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| !o.is_duplicate())
            .count();

        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_stats() {
        let (_dir, store) = open_temp();
        store.insert(vec![1.0, 2.0, 3.0], meta("a.pdf")).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(
            stats,
            StoreStats {
                entries: 1,
                dimension: Some(3),
                generation: 1
            }
        );
    }

    #[test]
    fn test_poisoned_lock_is_recovered_everywhere() {
        let (_dir, store) = open_temp();
        store.insert(vec![1.0, 0.0], meta("a.pdf")).unwrap();
        let store = Arc::new(store);

        let holder = Arc::clone(&store);
        let joined = std::thread::spawn(move || {
            let _guard = holder.state.write().unwrap();
            panic!("holder panicked");
        })
        .join();
        assert!(joined.is_err());
        assert!(store.state.is_poisoned());

        assert_eq!(store.len(), 1);
        assert_eq!(store.dimension(), Some(2));
        assert_eq!(store.generation(), 1);
        assert!(store.get("a.pdf").is_some());
        assert_eq!(store.stats().unwrap().entries, 1);
        assert_eq!(store.query(&[1.0, 0.0], 1).unwrap().len(), 1);

        let outcome = store.insert(vec![0.0, 1.0], meta("b.pdf")).unwrap();
        assert!(!outcome.is_duplicate());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_squared_euclidean() {
        assert_eq!(squared_euclidean(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_euclidean(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
    }
}
