// RAG pipeline
// Ingests PDFs into the vector index and answers questions grounded in retrieved chunks


use itertools::Itertools;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::database::{ChunkRecord, SearchResult, VectorStore};
use crate::document::{ChunkMetadata, ChunkingConfig, chunk_text, extract_text_blocking};
use crate::ollama::{
    CompletionClient, Embedder, EmbeddingClient, Generator, ModelStatus, Reachability,
};
use crate::session::{SessionStore, Turn};
use crate::{RagError, Result};

/// Step of `ask` that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Embedding,
    Retrieval,
    Generation,
}

impl fmt::Display for QueryStage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedding => write!(f, "query embedding"),
            Self::Retrieval => write!(f, "retrieval"),
            Self::Generation => write!(f, "generation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub message: String,
    pub filename: String,
    pub chunks_created: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatResult {
    pub response: String,
    pub sources: Vec<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub service: Reachability,
    pub embedding_model: ModelStatus,
    pub completion_model: ModelStatus,
    pub vector_db: bool,
}

impl HealthReport {
    #[inline]
    pub fn is_healthy(&self) -> bool {
        self.service.is_reachable()
            && self.embedding_model.available
            && self.completion_model.available
            && self.vector_db
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub chunking: ChunkingConfig,
    pub top_k: usize,
}

impl Default for PipelineSettings {
    #[inline]
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: 3,
        }
    }
}

impl PipelineSettings {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunking: config.chunking.clone(),
            top_k: config.retrieval.top_k,
        }
    }
}

/// One shared instance serves every request; all operations take `&self`
pub struct RagPipeline<E, G> {
    embedder: E,
    generator: G,
    index: VectorStore,
    sessions: Arc<SessionStore>,
    settings: PipelineSettings,
}

impl RagPipeline<EmbeddingClient, CompletionClient> {
    /// Wire up the Ollama clients, the LanceDB collection and a fresh session store
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = EmbeddingClient::from_config(&config.ollama)?;
        let generator = CompletionClient::from_config(&config.ollama)?;
        let index = VectorStore::from_config(config).await?;
        let sessions = Arc::new(SessionStore::new(config.sessions.max_turns));

        Ok(Self::new(
            embedder,
            generator,
            index,
            sessions,
            PipelineSettings::from_config(config),
        ))
    }
}

impl<E: Embedder, G: Generator> RagPipeline<E, G> {
    #[inline]
    pub fn new(
        embedder: E,
        generator: G,
        index: VectorStore,
        sessions: Arc<SessionStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            generator,
            index,
            sessions,
            settings,
        }
    }

    #[inline]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Extract, chunk and embed a PDF, then store every chunk in one batch.
    /// Nothing is stored unless every chunk was embedded.
    #[inline]
    pub async fn ingest(&self, pdf_content: Vec<u8>, filename: &str) -> Result<UploadResult> {
        info!("Ingesting {} ({} bytes)", filename, pdf_content.len());

        let chunks_created = self
            .ingest_chunks(pdf_content, filename)
            .await
            .map_err(|source| {
                warn!("Ingestion of {} failed: {}", filename, source);
                RagError::Ingestion {
                    filename: filename.to_string(),
                    source: Box::new(source),
                }
            })?;

        let message = if chunks_created == 0 {
            "PDF contained no extractable text".to_string()
        } else {
            "PDF uploaded and processed successfully".to_string()
        };

        info!("Ingested {} as {} chunks", filename, chunks_created);
        Ok(UploadResult {
            message,
            filename: filename.to_string(),
            chunks_created,
        })
    }

    async fn ingest_chunks(&self, pdf_content: Vec<u8>, filename: &str) -> Result<usize> {
        let text = extract_text_blocking(pdf_content).await?;
        let chunks = chunk_text(&text, filename, &self.settings.chunking);
        debug!("{} produced {} chunks", filename, chunks.len());

        let mut records = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.into_iter().enumerate() {
            let vector = self.embedder.embed(&chunk.content).await?;
            records.push(ChunkRecord::new(chunk, index, vector));
        }

        self.index.insert(&records).await?;
        Ok(records.len())
    }

    /// Answer `message` from the most similar chunks. A new session id is
    /// generated when none is given. Requests for the same session run one at a time.
    #[inline]
    pub async fn ask(&self, message: &str, session_id: Option<&str>) -> Result<ChatResult> {
        let session_id = session_id.map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
        let _guard = self.sessions.lock(&session_id).await;

        debug!("Answering question for session {}", session_id);

        let query_vector = self
            .embedder
            .embed(message)
            .await
            .map_err(|e| query_error(QueryStage::Embedding, e))?;

        let retrieved = self
            .index
            .query(&query_vector, self.settings.top_k)
            .await
            .map_err(|e| query_error(QueryStage::Retrieval, e))?;
        debug!("Retrieved {} chunks", retrieved.len());

        let context = retrieved.iter().map(|r| r.content.as_str()).join("\n\n");

        self.sessions.append(&session_id, Turn::user(message));
        let history = self.sessions.history(&session_id);

        let response = self
            .generator
            .complete(&history, &context)
            .await
            .map_err(|e| query_error(QueryStage::Generation, e))?;

        self.sessions
            .append(&session_id, Turn::assistant(response.as_str()));

        Ok(ChatResult {
            response,
            sources: format_sources(&retrieved),
            session_id,
        })
    }

    #[inline]
    pub fn get_history(&self, session_id: &str) -> Vec<Turn> {
        self.sessions.history(session_id)
    }

    #[inline]
    pub fn clear_history(&self, session_id: &str) {
        self.sessions.clear(session_id);
    }

    /// Distinct filenames of every ingested document, sorted
    #[inline]
    pub async fn list_document_filenames(&self) -> Result<Vec<String>> {
        let metadata = self.index.list_all().await?;
        Ok(metadata
            .into_iter()
            .map(|m| m.filename)
            .sorted()
            .dedup()
            .collect())
    }

    /// Remove a document's chunks, returning how many were removed
    #[inline]
    pub async fn delete_document(&self, filename: &str) -> Result<usize> {
        let removed = self.index.delete_by_filename(filename).await?;
        info!("Removed {} chunks of {}", removed, filename);
        Ok(removed)
    }

    #[inline]
    pub async fn health(&self) -> HealthReport {
        let (embedding_model, completion_model, vector_db) = tokio::join!(
            self.embedder.status(),
            self.generator.status(),
            self.index.validate_integrity(),
        );

        HealthReport {
            service: embedding_model.service.clone(),
            embedding_model,
            completion_model,
            vector_db,
        }
    }
}

fn query_error(stage: QueryStage, source: RagError) -> RagError {
    warn!("RAG query failed during {}: {}", stage, source);
    RagError::RagQuery {
        stage,
        source: Box::new(source),
    }
}

/// `File: <filename>, Page: <page>` per result, in retrieval order
#[inline]
pub fn format_sources(results: &[SearchResult]) -> Vec<String> {
    results.iter().map(|r| format_source(&r.metadata)).collect()
}

fn format_source(metadata: &ChunkMetadata) -> String {
    match metadata.page {
        Some(page) => format!("File: {}, Page: {}", metadata.filename, page),
        None => format!("File: {}", metadata.filename),
    }
}
