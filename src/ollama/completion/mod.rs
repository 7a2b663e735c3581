
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ModelStatus, OllamaService, agent_with_timeout, model_status_blocking, run_blocking};
use crate::config::OllamaConfig;
use crate::session::{Role, Turn};
use crate::{RagError, Result};

const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant that answers questions based on the provided context.\n\
Use the context to answer the user's question accurately. If the answer cannot be found in the context, say so.";

/// Produces an answer from conversation turns and retrieved context
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, turns: &[Turn], context: &str) -> Result<String>;

    async fn status(&self) -> ModelStatus;
}

#[derive(Debug, Clone)]
pub struct CompletionClient {
    service: OllamaService,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl CompletionClient {
    #[inline]
    pub fn new(service: OllamaService, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            service,
            model: model.into(),
            agent: agent_with_timeout(timeout),
        }
    }

    #[inline]
    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        Ok(Self::new(
            OllamaService::from_config(config)?,
            config.completion_model.clone(),
            config.completion_timeout(),
        ))
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate an answer in a single attempt. Only the latest user turn is
    /// sent to the model; earlier turns stay in the session log.
    #[inline]
    pub fn generate_completion(&self, turns: &[Turn], context: &str) -> Result<String> {
        self.service.ensure_ready(&self.model)?;

        let prompt = build_prompt(turns, context);
        debug!(
            "Requesting completion from {} (prompt length: {})",
            self.model,
            prompt.len()
        );

        let url = self.service.endpoint("/api/generate")?;
        let request_json = serde_json::to_string(&GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
        })
        .map_err(|e| RagError::Completion(format!("could not serialize request: {}", e)))?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| {
                warn!("Completion request failed: {}", e);
                RagError::Completion(e.to_string())
            })?;

        let generated: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Completion(format!("unreadable response: {}", e)))?;

        debug!("Completion returned {} characters", generated.response.len());
        Ok(generated.response)
    }
}

/// System instruction with the retrieved context, followed by the latest user question
#[inline]
pub fn build_prompt(turns: &[Turn], context: &str) -> String {
    let question = turns
        .iter()
        .rev()
        .find(|turn| turn.role == Role::User)
        .map_or("", |turn| turn.content.as_str());

    format!(
        "{}\n\nContext:\n{}\n\nUser Question: {}",
        SYSTEM_INSTRUCTION, context, question
    )
}

#[async_trait]
impl Generator for CompletionClient {
    async fn complete(&self, turns: &[Turn], context: &str) -> Result<String> {
        let client = self.clone();
        let turns = turns.to_vec();
        let context = context.to_owned();
        run_blocking(move || client.generate_completion(&turns, &context)).await
    }

    async fn status(&self) -> ModelStatus {
        model_status_blocking(self.service.clone(), self.model.clone()).await
    }
}
