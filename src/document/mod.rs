// Document module
// Turns uploaded PDFs into page-tagged text and embedding-sized chunks

pub mod chunking;
pub mod extractor;

pub use chunking::{ChunkMetadata, ChunkingConfig, DocumentChunk, chunk_text, normalize_whitespace};
pub use extractor::{extract_text, extract_text_blocking};
