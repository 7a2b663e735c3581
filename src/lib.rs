use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Error extracting text from PDF: {0}")]
    Extraction(String),

    #[error(
        "Ollama service is not running at {url} ({cause}). Please start Ollama with '{remediation}'"
    )]
    ServiceUnavailable {
        url: String,
        cause: String,
        remediation: String,
    },

    #[error("Model '{model}' not found. Please run '{remediation}'")]
    ModelNotFound { model: String, remediation: String },

    #[error("Error generating embeddings after {attempts} attempts: {message}")]
    EmbeddingGeneration { attempts: u32, message: String },

    #[error("Error in chat completion: {0}")]
    Completion(String),

    #[error("Error ingesting '{filename}': {source}")]
    Ingestion {
        filename: String,
        #[source]
        source: Box<RagError>,
    },

    #[error("Error in RAG chat during {stage}: {source}")]
    RagQuery {
        stage: pipeline::QueryStage,
        #[source]
        source: Box<RagError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Follow `Ingestion` and `RagQuery` wrappers down to the error that started it.
    #[inline]
    pub fn innermost(&self) -> &Self {
        match self {
            Self::Ingestion { source, .. } | Self::RagQuery { source, .. } => source.innermost(),
            other => other,
        }
    }

    /// The command an operator should run to fix a dependency error, if any.
    #[inline]
    pub fn remediation(&self) -> Option<&str> {
        match self.innermost() {
            Self::ServiceUnavailable { remediation, .. }
            | Self::ModelNotFound { remediation, .. } => Some(remediation),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for RagError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod ollama;
pub mod pipeline;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;
