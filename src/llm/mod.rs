pub mod prompts;
pub mod providers;

#[cfg(test)]
pub mod mock;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// A text-in, text-out completion service.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn model(&self) -> &str;
}

/// Builds completion clients for the configured backend, one per model.
pub struct LlmManager {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        let manager = Self {
            config: config.clone(),
            client,
        };

        // Fail at startup rather than on the first chat message
        manager.client_for(&config.model)?;

        Ok(manager)
    }

    pub fn default_model(&self) -> &str {
        &self.config.model
    }

    pub fn models(&self) -> &[String] {
        &self.config.models
    }

    pub fn client_for(&self, model: &str) -> Result<Arc<dyn TextCompletion>, LlmError> {
        if !self.config.models.iter().any(|m| m == model) {
            return Err(LlmError::ConfigError(format!("Unknown model: {}", model)));
        }

        let client: Arc<dyn TextCompletion> = match self.config.backend.as_str() {
            "ollama" => Arc::new(providers::ollama::OllamaProvider::new(
                &self.config,
                model,
                self.client.clone(),
            )),
            "remote" => Arc::new(providers::remote::RemoteLlmProvider::new(
                &self.config,
                model,
                self.client.clone(),
            )?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    self.config.backend
                )))
            }
        };

        Ok(client)
    }
}
