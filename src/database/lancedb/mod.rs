// LanceDB vector database module
// Handles vector storage and similarity search for document chunks


pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::document::{ChunkMetadata, DocumentChunk};

/// One embedded chunk as stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// `<filename>_<chunk_id>_<index>`, index being the position in the ingested batch
    pub id: String,
    pub vector: Vec<f32>,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// RFC 3339 timestamp of when the record was built
    pub created_at: String,
}

impl ChunkRecord {
    #[inline]
    pub fn new(chunk: DocumentChunk, index: usize, vector: Vec<f32>) -> Self {
        Self {
            id: record_id(&chunk.metadata, index),
            vector,
            content: chunk.content,
            metadata: chunk.metadata,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[inline]
pub fn record_id(metadata: &ChunkMetadata, index: usize) -> String {
    format!("{}_{}_{}", metadata.filename, metadata.chunk_id, index)
}
