use crate::config::LlmConfig;
use crate::llm::{LlmError, TextCompletion};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

const DEFAULT_API_URL: &str = "http://localhost:11434/api/generate";

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    done: Option<bool>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig, model: &str, client: reqwest::Client) -> Self {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Self {
            client,
            api_url,
            model: model.to_string(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl TextCompletion for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        info!("Sending request to Ollama with model: {}", self.model);
        debug!("API URL: {}", self.api_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        debug!("Sending request to Ollama: {:?}", request);

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            // Try to get the error message from the response body
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        // Get the raw text response first for diagnostics
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        debug!("Raw response from Ollama: {}", response_text);

        let ollama_response = parse_response(&response_text)?;
        if ollama_response.done == Some(false) {
            debug!("Ollama reported an unfinished generation");
        }

        Ok(ollama_response.response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn parse_response(body: &str) -> Result<OllamaResponse, LlmError> {
    serde_json::from_str::<OllamaResponse>(body).map_err(|e| {
        error!("Failed to parse Ollama response: {} - Response was: {}", e, body);
        LlmError::ResponseError(format!(
            "Failed to parse Ollama response: {} - Response was: {}",
            e, body
        ))
    })
}
