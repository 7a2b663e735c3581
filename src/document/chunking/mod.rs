#[cfg(test)]
mod tests;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::extractor::PAGE_MARKER_PREFIX;

/// Provenance of a chunk: which file, which page and where in the ingestion it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    /// 1-based page number taken from the page marker
    pub page: Option<u32>,
    /// Running index across the whole document; only unique within one ingestion
    pub chunk_id: u32,
    /// Position of the window within its page, present only when a page was split
    pub sub_chunk: Option<u32>,
}

/// A passage of document text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Configuration for page-aware chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Pages up to this many characters become a single chunk
    pub chunk_size: usize,
    /// Words repeated between consecutive windows of a split page
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 0,
        }
    }
}

impl ChunkingConfig {
    /// Words per window when a page is too long for a single chunk
    #[inline]
    pub fn window_words(&self) -> usize {
        (self.chunk_size / 10).max(1)
    }

    fn window_step(&self) -> usize {
        self.window_words().saturating_sub(self.chunk_overlap).max(1)
    }
}

/// Collapse every whitespace run to a single space and trim the ends
#[inline]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

/// Split extracted document text into chunks, one per page where the page fits,
/// otherwise fixed-size word windows.
#[inline]
pub fn chunk_text(text: &str, filename: &str, config: &ChunkingConfig) -> Vec<DocumentChunk> {
    let normalized = normalize_whitespace(text);
    let mut chunks = Vec::new();
    let mut chunk_id = 0u32;

    for (position, segment) in normalized.split(PAGE_MARKER_PREFIX).enumerate() {
        if segment.trim().is_empty() {
            continue;
        }

        let (page, body) = split_page_header(segment, position);
        let body = body.trim();
        if body.is_empty() {
            continue;
        }

        if body.chars().count() <= config.chunk_size {
            chunks.push(DocumentChunk {
                content: body.to_string(),
                metadata: ChunkMetadata {
                    filename: filename.to_string(),
                    page: Some(page),
                    chunk_id,
                    sub_chunk: None,
                },
            });
            chunk_id += 1;
            continue;
        }

        for (sub_chunk, window) in word_windows(body, config).into_iter().enumerate() {
            chunks.push(DocumentChunk {
                content: window,
                metadata: ChunkMetadata {
                    filename: filename.to_string(),
                    page: Some(page),
                    chunk_id,
                    sub_chunk: Some(sub_chunk as u32),
                },
            });
            chunk_id += 1;
        }
    }

    debug!(
        "Chunked '{}' into {} chunks (window {} words, overlap {})",
        filename,
        chunks.len(),
        config.window_words(),
        config.chunk_overlap
    );

    chunks
}

/// Read the page number off a segment that followed a marker. Segments whose
/// header doesn't parse keep their whole text and fall back to their position.
fn split_page_header(segment: &str, position: usize) -> (u32, &str) {
    let fallback = (position as u32, segment);

    match segment.split_once("---") {
        Some((header, rest)) => header
            .trim()
            .parse::<u32>()
            .map_or(fallback, |page| (page, rest)),
        None => fallback,
    }
}

fn word_windows(body: &str, config: &ChunkingConfig) -> Vec<String> {
    let words = body.split_whitespace().collect::<Vec<_>>();
    let window = config.window_words();
    let step = config.window_step();

    let mut windows = Vec::with_capacity(words.len().div_ceil(step));
    let mut start = 0;
    while start < words.len() {
        let end = (start + window).min(words.len());
        let content = words[start..end].join(" ");
        if !content.trim().is_empty() {
            windows.push(content);
        }
        if end == words.len() {
            break;
        }
        start += step;
    }

    windows
}
