// Database module
// Chunk vectors and their metadata live in a local LanceDB table

pub mod lancedb;

pub use self::lancedb::vector_store::{SearchResult, VectorStore};
pub use self::lancedb::{ChunkRecord, record_id};
