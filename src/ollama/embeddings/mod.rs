
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{
    ModelStatus, OllamaService, RetryPolicy, agent_with_timeout, model_status_blocking, run_blocking,
};
use crate::config::OllamaConfig;
use crate::{RagError, Result};

/// Turns text into embedding vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn status(&self) -> ModelStatus;
}

#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    service: OllamaService,
    model: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

enum AttemptError {
    Transient(String),
    Fatal(String),
}

impl EmbeddingClient {
    #[inline]
    pub fn new(
        service: OllamaService,
        model: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            model: model.into(),
            agent: agent_with_timeout(timeout),
            retry,
        }
    }

    #[inline]
    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        Ok(Self::new(
            OllamaService::from_config(config)?,
            config.embedding_model.clone(),
            config.embedding_timeout(),
            config.retry_policy(),
        ))
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn service(&self) -> &OllamaService {
        &self.service
    }

    /// Embed a single text. Checks the server and model first, then retries
    /// transport failures and server errors per the retry policy.
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.service.ensure_ready(&self.model)?;

        debug!("Generating embedding for text (length: {})", text.len());

        let url = self.service.endpoint("/api/embeddings")?;
        let request_json = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            prompt: text,
        })
        .map_err(|e| anyhow::anyhow!("Failed to serialize embedding request: {}", e))?;

        let (attempts, response_text) = self.request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let embed_response: EmbedResponse =
            serde_json::from_str(&response_text).map_err(|e| RagError::EmbeddingGeneration {
                attempts,
                message: format!("unreadable embedding response: {}", e),
            })?;

        if embed_response.embedding.is_empty() {
            return Err(RagError::EmbeddingGeneration {
                attempts,
                message: "server returned an empty embedding".to_string(),
            });
        }

        debug!(
            "Generated embedding with {} dimensions",
            embed_response.embedding.len()
        );
        Ok(embed_response.embedding)
    }

    /// Returns the response body with the attempt that produced it
    fn request_with_retry<F>(&self, mut request_fn: F) -> Result<(u32, String)>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            debug!("Embedding request attempt {}/{}", attempt, max_attempts);

            match request_fn().map_err(classify) {
                Ok(response_text) => return Ok((attempt, response_text)),
                Err(AttemptError::Fatal(message)) => {
                    warn!("Non-retryable embedding error: {}", message);
                    return Err(RagError::EmbeddingGeneration {
                        attempts: attempt,
                        message,
                    });
                }
                Err(AttemptError::Transient(message)) => {
                    warn!(
                        "Embedding request failed: {}, attempt {}/{}",
                        message, attempt, max_attempts
                    );
                    last_error = message;

                    if attempt < max_attempts {
                        debug!("Waiting {:?} before retry", self.retry.delay);
                        std::thread::sleep(self.retry.delay);
                    }
                }
            }
        }

        error!(
            "All {} embedding attempts failed against {}",
            max_attempts,
            self.service.base_url()
        );
        Err(RagError::EmbeddingGeneration {
            attempts: max_attempts,
            message: last_error,
        })
    }
}

fn classify(error: ureq::Error) -> AttemptError {
    match &error {
        ureq::Error::StatusCode(status) if *status >= 500 => {
            AttemptError::Transient(format!("server error: HTTP {}", status))
        }
        ureq::Error::StatusCode(status) => {
            AttemptError::Fatal(format!("client error: HTTP {}", status))
        }
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => AttemptError::Transient(format!("transport error: {}", error)),
        _ => AttemptError::Fatal(error.to_string()),
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_owned();
        run_blocking(move || client.generate_embedding(&text)).await
    }

    async fn status(&self) -> ModelStatus {
        model_status_blocking(self.service.clone(), self.model.clone()).await
    }
}
