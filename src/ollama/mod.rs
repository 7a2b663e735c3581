// Ollama integration
// Liveness probing, model discovery, and the embedding and completion clients built on them


pub mod completion;
pub mod embeddings;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::OllamaConfig;
use crate::{RagError, Result};

pub use completion::{CompletionClient, Generator};
pub use embeddings::{Embedder, EmbeddingClient};

pub const START_SERVICE_COMMAND: &str = "ollama serve";

/// Fixed-count, fixed-delay retry policy for transient request failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Outcome of a liveness probe against the Ollama server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reachability {
    Reachable,
    Unreachable { cause: String },
}

impl Reachability {
    #[inline]
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

impl fmt::Display for Reachability {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable => write!(f, "connected"),
            Self::Unreachable { cause } => write!(f, "disconnected ({})", cause),
        }
    }
}

/// Whether a model can serve requests right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    pub model: String,
    pub service: Reachability,
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
    pub modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Connection to an Ollama server shared by the embedding and completion clients
#[derive(Debug, Clone)]
pub struct OllamaService {
    base_url: Url,
    probe_agent: ureq::Agent,
}

impl OllamaService {
    #[inline]
    pub fn new(base_url: Url, probe_timeout: Duration) -> Self {
        Self {
            base_url,
            probe_agent: agent_with_timeout(probe_timeout),
        }
    }

    #[inline]
    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        Ok(Self::new(config.ollama_url()?, config.probe_timeout()))
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RagError::Config(format!("Invalid Ollama endpoint {}: {}", path, e)))
    }

    /// Check that the server answers its model listing endpoint
    #[inline]
    pub fn probe(&self) -> Reachability {
        match self.fetch_tags() {
            Ok(_) => Reachability::Reachable,
            Err(cause) => {
                debug!("Ollama at {} is unreachable: {}", self.base_url, cause);
                Reachability::Unreachable { cause }
            }
        }
    }

    #[inline]
    pub fn is_reachable(&self) -> bool {
        self.probe().is_reachable()
    }

    /// List the models registered with the server
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let body = self
            .fetch_tags()
            .map_err(|cause| self.unavailable(cause))?;
        parse_models(&body)
    }

    /// True when `model` is a substring of any registered model name, so
    /// `nomic-embed-text` matches `nomic-embed-text:latest`
    #[inline]
    pub fn is_model_available(&self, model: &str) -> bool {
        match self.list_models() {
            Ok(models) => models.iter().any(|m| m.name.contains(model)),
            Err(e) => {
                debug!("Could not list models: {}", e);
                false
            }
        }
    }

    #[inline]
    pub fn model_status(&self, model: &str) -> ModelStatus {
        let (service, available) = match self.fetch_tags() {
            Ok(body) => {
                let available = parse_models(&body)
                    .map(|models| models.iter().any(|m| m.name.contains(model)))
                    .unwrap_or(false);
                (Reachability::Reachable, available)
            }
            Err(cause) => (Reachability::Unreachable { cause }, false),
        };

        ModelStatus {
            model: model.to_string(),
            service,
            available,
        }
    }

    /// Fail fast unless the server is up and `model` has been pulled
    #[inline]
    pub fn ensure_ready(&self, model: &str) -> Result<()> {
        let models = self.list_models()?;

        if models.iter().any(|m| m.name.contains(model)) {
            return Ok(());
        }

        let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        warn!(
            "Model {} not found. Available models: {:?}",
            model, available_models
        );
        Err(RagError::ModelNotFound {
            model: model.to_string(),
            remediation: format!("ollama pull {}", model),
        })
    }

    fn fetch_tags(&self) -> std::result::Result<String, String> {
        let url = self.endpoint("/api/tags").map_err(|e| e.to_string())?;

        self.probe_agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| e.to_string())
    }

    fn unavailable(&self, cause: String) -> RagError {
        warn!("Ollama service unavailable at {}: {}", self.base_url, cause);
        RagError::ServiceUnavailable {
            url: self.base_url.to_string(),
            cause,
            remediation: START_SERVICE_COMMAND.to_string(),
        }
    }
}

fn parse_models(body: &str) -> Result<Vec<ModelInfo>> {
    let response: ModelsResponse = serde_json::from_str(body)
        .map_err(|e| anyhow::anyhow!("Failed to parse models response: {}", e))?;
    debug!("Found {} models", response.models.len());
    Ok(response.models)
}

pub(crate) fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Run a blocking client call on tokio's blocking pool
pub(crate) async fn run_blocking<T, F>(call: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| anyhow::anyhow!("Ollama request task failed: {}", e))?
}

/// `OllamaService::model_status` without blocking the async runtime
pub(crate) async fn model_status_blocking(service: OllamaService, model: String) -> ModelStatus {
    let fallback = model.clone();
    run_blocking(move || Ok(service.model_status(&model)))
        .await
        .unwrap_or_else(|e| ModelStatus {
            model: fallback,
            service: Reachability::Unreachable {
                cause: e.to_string(),
            },
            available: false,
        })
}
