//! JSON persistence for the chunk corpus and the QA dataset.
//!
//! Both are stored as a pretty-printed JSON array of records. Nothing else
//! about the on-disk layout is load-bearing.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{Chunk, QaRecord, SharedChunk};

pub fn save_corpus(path: &Path, chunks: &[Chunk]) -> Result<()> { write_json(path, chunks) }

/// Loads the corpus and rejects duplicate chunk ids, since both rankers
/// and the metrics key on them.
pub fn load_corpus(path: &Path) -> Result<Vec<SharedChunk>> {
    if !path.exists() { return Err(Error::NotFound(format!("corpus at {}", path.display()))); }
    let chunks: Vec<Chunk> = read_json(path)?;
    let mut seen = HashSet::with_capacity(chunks.len());
    for c in &chunks {
        if !seen.insert(c.chunk_id.as_str()) { return Err(Error::Operation(format!("duplicate chunk_id '{}' in {}", c.chunk_id, path.display()))); }
    }
    tracing::info!(chunks = chunks.len(), path = %path.display(), "loaded corpus");
    Ok(chunks.into_iter().map(Arc::new).collect())
}

pub fn save_qa_dataset(path: &Path, records: &[QaRecord]) -> Result<()> { write_json(path, records) }

pub fn load_qa_dataset(path: &Path) -> Result<Vec<QaRecord>> {
    if !path.exists() { return Err(Error::NotFound(format!("QA dataset at {}", path.display()))); }
    read_json(path)
}

/// Writes any serializable report as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) { fs::create_dir_all(parent)?; }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> { Ok(serde_json::from_str(&fs::read_to_string(path)?)?) }
