//! Whitespace-token sliding-window chunker with a minimum-size quality gate.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ChunkingSettings;
use crate::error::Result;
use crate::types::{Chunk, DocumentMeta};

#[derive(Debug, Clone)]
pub struct Chunker {
    settings: ChunkingSettings,
}

impl Default for Chunker {
    fn default() -> Self { Self { settings: ChunkingSettings::default() } }
}

impl Chunker {
    pub fn new(settings: ChunkingSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &ChunkingSettings { &self.settings }

    /// Splits `text` into overlapping windows of at most `chunk_size` tokens.
    ///
    /// Documents shorter than `min_chunk_size` tokens produce nothing, and
    /// any window that ends up below the floor (normally only the clipped
    /// trailing one) is discarded.
    pub fn chunk(&self, text: &str, meta: &DocumentMeta) -> Vec<Chunk> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let ChunkingSettings { chunk_size, overlap, min_chunk_size } = self.settings;
        if tokens.is_empty() || tokens.len() < min_chunk_size { return vec![]; }

        let id_prefix = source_prefix(&meta.source_id);
        if tokens.len() <= chunk_size {
            return vec![make_chunk(&id_prefix, 0, &tokens, meta)];
        }

        let step = chunk_size - overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut window = 0;
        while start < tokens.len() {
            let end = (start + chunk_size).min(tokens.len());
            let slice = &tokens[start..end];
            if slice.len() >= min_chunk_size { chunks.push(make_chunk(&id_prefix, window, slice, meta)); }
            if end >= tokens.len() { break; }
            start += step;
            window += 1;
        }
        chunks
    }

    /// Chunks every `.txt` file under `data_dir`. The path relative to
    /// `data_dir` becomes the `source_id` and the file stem the `title`.
    pub fn chunk_directory(&self, data_dir: &Path) -> Result<Vec<Chunk>> { self.chunk_files(data_dir, list_txt_files(data_dir)) }

    pub fn chunk_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<Chunk>> {
        let mut files = list_txt_files(data_dir);
        if files.len() > limit {
            files.truncate(limit);
            tracing::info!(limit, "limited to first files");
        }
        self.chunk_files(data_dir, files)
    }

    fn chunk_files(&self, data_dir: &Path, files: Vec<PathBuf>) -> Result<Vec<Chunk>> {
        if files.is_empty() {
            tracing::warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        let mut dropped = 0usize;
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::debug!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            let content = read_file_content(file_path)?;
            let meta = meta_from_path(file_path, data_dir);
            let chunks = self.chunk(&content, &meta);
            if chunks.is_empty() { dropped += 1; }
            all_chunks.extend(chunks);
        }
        tracing::info!(files = files.len(), dropped, chunks = all_chunks.len(), "chunked directory");
        Ok(all_chunks)
    }
}

fn make_chunk(id_prefix: &str, window: usize, tokens: &[&str], meta: &DocumentMeta) -> Chunk {
    Chunk {
        chunk_id: format!("{id_prefix}:{window}"),
        source_id: meta.source_id.clone(),
        title: meta.title.clone(),
        content: tokens.join(" "),
        token_count: tokens.len(),
    }
}

fn source_prefix(source_id: &str) -> String {
    let hex = blake3::hash(source_id.as_bytes()).to_hex();
    hex.as_str()[..16].to_string()
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn meta_from_path(file_path: &Path, data_dir: &Path) -> DocumentMeta {
    let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path);
    let title = file_path.file_stem().map_or_else(|| relative_path.display().to_string(), |s| s.to_string_lossy().to_string());
    DocumentMeta::new(relative_path.to_string_lossy(), title)
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(std::result::Result::ok).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
    }
    txt_files.sort();
    txt_files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String { (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ") }

    fn small() -> Chunker { Chunker::new(ChunkingSettings { chunk_size: 10, overlap: 2, min_chunk_size: 5 }).expect("valid") }

    #[test]
    fn windows_step_by_chunk_size_minus_overlap() {
        let chunks = small().chunk(&words(20), &DocumentMeta::new("doc", "Doc"));
        // windows start at 0, 8, 16; the last one has 4 tokens and is dropped
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content.split_whitespace().next(), Some("w0"));
        assert_eq!(chunks[1].content.split_whitespace().next(), Some("w8"));
        assert_eq!(chunks[1].token_count, 10);
    }

    #[test]
    fn chunk_ids_are_unique_and_stable() {
        let c = small();
        let meta = DocumentMeta::new("doc", "Doc");
        let a = c.chunk(&words(40), &meta);
        let b = c.chunk(&words(40), &meta);
        let ids: std::collections::HashSet<_> = a.iter().map(|c| c.chunk_id.clone()).collect();
        assert_eq!(ids.len(), a.len());
        assert_eq!(a, b);
        let other = c.chunk(&words(40), &DocumentMeta::new("other", "Other"));
        assert_ne!(a[0].chunk_id, other[0].chunk_id);
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert!(small().chunk("  \n\t ", &DocumentMeta::new("d", "D")).is_empty());
        assert!(small().chunk("", &DocumentMeta::new("d", "D")).is_empty());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        assert!(Chunker::new(ChunkingSettings { chunk_size: 10, overlap: 10, min_chunk_size: 1 }).is_err());
    }
}
