//! On-disk layout of a store directory.
//!
//! ```text
//! MANIFEST                   committed generation (JSON)
//! vectors-<gen>.bin          vector collection of <gen>
//! metadata-<gen>.json        metadata collection of <gen> (JSON array)
//! ```
//!
//! A generation becomes visible only when `MANIFEST` is atomically replaced
//! to name it. Both collection files of the new generation are written and
//! synced before that rename, so after a crash the manifest names either the
//! old generation or the new one, and both of its files are complete.
//!
//! Vector file (little-endian):
//! `b"RVEC"` | u32 version | u32 dimension | u64 count | count*dimension f32 | u32 crc32

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use resume_core::error::{ResumeError, Result};
use resume_core::types::Metadata;

pub(crate) const MANIFEST_FILE: &str = "MANIFEST";
pub(crate) const FORMAT_VERSION: u32 = 1;

const VECTOR_MAGIC: [u8; 4] = *b"RVEC";
const HEADER_LEN: usize = 4 + 4 + 4 + 8;
const CHECKSUM_LEN: usize = 4;
const TMP_SUFFIX: &str = ".tmp";

/// Commit record for one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Manifest {
    pub format_version: u32,
    pub generation: u64,
    pub entries: u64,
    pub dimension: usize,
    pub committed_at: DateTime<Utc>,
}

/// Committed state read back from a store directory.
#[derive(Debug, Default)]
pub(crate) struct Loaded {
    pub generation: u64,
    pub dimension: Option<usize>,
    pub vectors: Vec<f32>,
    pub metadata: Vec<Metadata>,
}

pub(crate) fn vectors_file(generation: u64) -> String {
    format!("vectors-{:020}.bin", generation)
}

pub(crate) fn metadata_file(generation: u64) -> String {
    format!("metadata-{:020}.json", generation)
}

fn corrupt(msg: impl Into<String>) -> ResumeError {
    ResumeError::CorruptState(msg.into())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load the committed generation of `dir`.
///
/// No manifest means no committed state: the store starts empty, and a
/// complete staged generation 1 left by an interrupted first insert is
/// removed. Collection files of any later generation without a manifest, or
/// any disagreement between the manifest and the two collection files, is
/// `CorruptState`; in that case nothing in the directory is touched.
pub(crate) fn load(dir: &Path) -> Result<Loaded> {
    let manifest = match read_optional(&dir.join(MANIFEST_FILE))? {
        Some(bytes) => Some(
            serde_json::from_slice::<Manifest>(&bytes)
                .map_err(|e| corrupt(format!("manifest unreadable: {}", e)))?,
        ),
        None => None,
    };

    let loaded = match manifest {
        Some(manifest) => load_generation(dir, &manifest)?,
        None => {
            check_uncommitted(dir)?;
            Loaded::default()
        }
    };

    remove_stale_files(dir, loaded.generation);
    Ok(loaded)
}

fn load_generation(dir: &Path, manifest: &Manifest) -> Result<Loaded> {
    if manifest.format_version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported manifest format version {}",
            manifest.format_version
        )));
    }

    let generation = manifest.generation;
    let vec_name = vectors_file(generation);
    let meta_name = metadata_file(generation);

    let (vec_bytes, meta_bytes) = match (
        read_optional(&dir.join(&vec_name))?,
        read_optional(&dir.join(&meta_name))?,
    ) {
        (Some(v), Some(m)) => (v, m),
        (Some(_), None) => {
            return Err(corrupt(format!(
                "{} exists but {} is missing",
                vec_name, meta_name
            )))
        }
        (None, Some(_)) => {
            return Err(corrupt(format!(
                "{} exists but {} is missing",
                meta_name, vec_name
            )))
        }
        (None, None) => {
            return Err(corrupt(format!(
                "manifest names generation {} but neither {} nor {} exists",
                generation, vec_name, meta_name
            )))
        }
    };

    let (dimension, vectors) = decode_vectors(&vec_bytes)?;
    let metadata: Vec<Metadata> = serde_json::from_slice(&meta_bytes)
        .map_err(|e| corrupt(format!("{} unreadable: {}", meta_name, e)))?;

    let vector_count = vectors.len() / dimension;
    if vector_count != metadata.len() {
        return Err(corrupt(format!(
            "{} holds {} embeddings but {} holds {} metadata records",
            vec_name,
            vector_count,
            meta_name,
            metadata.len()
        )));
    }
    if vector_count as u64 != manifest.entries {
        return Err(corrupt(format!(
            "manifest records {} entries but generation {} holds {}",
            manifest.entries, generation, vector_count
        )));
    }
    if dimension != manifest.dimension {
        return Err(corrupt(format!(
            "manifest records dimension {} but {} has dimension {}",
            manifest.dimension, vec_name, dimension
        )));
    }

    let mut seen = HashSet::with_capacity(metadata.len());
    for meta in &metadata {
        if !seen.insert(meta.filename.as_str()) {
            return Err(corrupt(format!(
                "filename {:?} appears more than once in {}",
                meta.filename, meta_name
            )));
        }
    }

    debug!(generation, entries = vector_count, dimension, "Loaded committed generation");

    Ok(Loaded {
        generation,
        dimension: Some(dimension),
        vectors,
        metadata,
    })
}

/// Decide whether collection files found without a manifest are safe to drop.
///
/// The only files a store can hold before its first commit are the complete
/// staged pair of generation 1. Anything else means a manifest existed and
/// was lost, which is `CorruptState`.
fn check_uncommitted(dir: &Path) -> Result<()> {
    let mut generations = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        if let Some(generation) = name.to_str().and_then(parse_generation) {
            generations.push((generation, name.to_string_lossy().into_owned()));
        }
    }

    if generations.is_empty() {
        return Ok(());
    }
    if let Some((_, name)) = generations.iter().find(|(g, _)| *g != 1) {
        return Err(corrupt(format!(
            "{} exists but {} is missing; a committed generation lost its manifest",
            name, MANIFEST_FILE
        )));
    }

    let has_vectors = dir.join(vectors_file(1)).is_file();
    let has_metadata = dir.join(metadata_file(1)).is_file();
    if !(has_vectors && has_metadata) {
        return Err(corrupt(format!(
            "{} is missing and generation 1 is incomplete ({}: {}, {}: {})",
            MANIFEST_FILE,
            vectors_file(1),
            has_vectors,
            metadata_file(1),
            has_metadata
        )));
    }

    debug!("Found staged first generation without a manifest");
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Vector file codec
// ---------------------------------------------------------------------------

/// Encode row-major vectors of `dimension` components.
///
/// `parts` are concatenated, which lets an insert write the existing rows and
/// the new row without first copying them into one buffer.
pub(crate) fn encode_vectors(dimension: usize, parts: &[&[f32]]) -> Vec<u8> {
    let values: usize = parts.iter().map(|p| p.len()).sum();
    let count = if dimension == 0 { 0 } else { values / dimension };

    let mut buf = Vec::with_capacity(HEADER_LEN + values * 4 + CHECKSUM_LEN);
    buf.extend_from_slice(&VECTOR_MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&(dimension as u32).to_le_bytes());
    buf.extend_from_slice(&(count as u64).to_le_bytes());
    for part in parts {
        for v in *part {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }
    let checksum = crc32fast::hash(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf
}

/// Decode a vector file into `(dimension, row-major values)`.
pub(crate) fn decode_vectors(bytes: &[u8]) -> Result<(usize, Vec<f32>)> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(corrupt(format!(
            "vector file truncated: {} bytes",
            bytes.len()
        )));
    }

    let (body, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let stored = u32::from_le_bytes(array4(trailer));
    let actual = crc32fast::hash(body);
    if stored != actual {
        return Err(corrupt(format!(
            "vector file checksum mismatch: stored {:08x}, computed {:08x}",
            stored, actual
        )));
    }

    if body[0..4] != VECTOR_MAGIC {
        return Err(corrupt("vector file has wrong magic bytes"));
    }
    let version = u32::from_le_bytes(array4(&body[4..8]));
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported vector file version {}", version)));
    }
    let dimension = u32::from_le_bytes(array4(&body[8..12])) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&body[12..20]);
    let count = u64::from_le_bytes(count_bytes) as usize;

    if dimension == 0 {
        return Err(corrupt("vector file declares dimension 0"));
    }

    let payload = &body[HEADER_LEN..];
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| corrupt("vector file header overflows"))?;
    if payload.len() != expected {
        return Err(corrupt(format!(
            "vector file declares {} x {} values but carries {} bytes",
            count,
            dimension,
            payload.len()
        )));
    }

    let vectors = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(array4(c)))
        .collect();

    Ok((dimension, vectors))
}

fn array4(bytes: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&bytes[..4]);
    out
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write both collection files of `generation`. Not yet visible to readers.
pub(crate) fn stage_generation(
    dir: &Path,
    generation: u64,
    dimension: usize,
    vectors: &[&[f32]],
    metadata: &[&Metadata],
) -> Result<()> {
    let vector_bytes = encode_vectors(dimension, vectors);
    let metadata_bytes = serde_json::to_vec_pretty(metadata)?;

    write_synced(dir, &vectors_file(generation), &vector_bytes)?;
    write_synced(dir, &metadata_file(generation), &metadata_bytes)?;
    sync_dir(dir)?;
    Ok(())
}

/// Make `manifest` the committed generation.
///
/// The rename is the commit point. An error returned from here means the
/// rename did not happen and the previous manifest is still in force.
pub(crate) fn commit_manifest(dir: &Path, manifest: &Manifest) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(manifest)?;
    write_synced(dir, MANIFEST_FILE, &bytes)?;
    if let Err(e) = sync_dir(dir) {
        warn!(
            dir = %dir.display(),
            generation = manifest.generation,
            error = %e,
            "Manifest renamed but directory sync failed"
        );
    }
    Ok(())
}

/// Remove the collection files of `generation`. Missing files are ignored.
///
/// Every file is attempted; the first failure is returned.
pub(crate) fn discard_generation(dir: &Path, generation: u64) -> Result<()> {
    let mut first_err = None;
    for name in [vectors_file(generation), metadata_file(generation)] {
        for path in [dir.join(&name), dir.join(format!("{}{}", name, TMP_SUFFIX))] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
    }
    match first_err {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn write_synced(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let tmp = dir.join(format!("{}{}", name, TMP_SUFFIX));
    let dst = dir.join(name);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, &dst)?;
    Ok(())
}

fn sync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        File::open(dir)?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

fn parse_generation(name: &str) -> Option<u64> {
    name.strip_prefix("vectors-")
        .and_then(|rest| rest.strip_suffix(".bin"))
        .or_else(|| {
            name.strip_prefix("metadata-")
                .and_then(|rest| rest.strip_suffix(".json"))
        })
        .and_then(|digits| digits.parse().ok())
}

/// Remove files that do not belong to the committed generation.
///
/// These are staged files of an insert that crashed before its manifest
/// commit, superseded generations whose removal was interrupted, and temp
/// files. Failures are logged and otherwise ignored.
fn remove_stale_files(dir: &Path, committed: u64) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot scan index directory for stale files");
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        let stale = name.ends_with(TMP_SUFFIX)
            || parse_generation(name).is_some_and(|generation| generation != committed);
        if !stale {
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => warn!(file = name, committed, "Removed stale index file"),
            Err(e) => warn!(file = name, error = %e, "Failed to remove stale index file"),
        }
    }
}
