use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::core::relevance::ScoringBackend;
use crate::services::sources::{build_http_client, DEFAULT_REQUEST_TIMEOUT};
use crate::services::UpstreamError;

pub const DEFAULT_INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 50;
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    temperature: f64,
    return_full_text: bool,
}

/// Hosted text-generation endpoint used to score postings
pub struct InferenceBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_new_tokens: u32,
    temperature: f64,
}

impl InferenceBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_generation(mut self, max_new_tokens: u32, temperature: f64) -> Self {
        self.max_new_tokens = max_new_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl ScoringBackend for InferenceBackend {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredentials("HUGGINGFACE_API_KEY"))?;

        let request = GenerationRequest {
            inputs: prompt,
            parameters: GenerationParameters {
                max_new_tokens: self.max_new_tokens,
                temperature: self.temperature,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::from_response(response).await);
        }

        let body: Value = response.json().await?;
        let text = generated_text(&body)
            .ok_or_else(|| UpstreamError::InvalidResponse(format!("No generated_text in reply: {}", body)))?;

        debug!("Model reply: {}", text);
        Ok(text.trim().to_string())
    }
}

/// `generated_text` from `[{"generated_text": ..}]` or a bare object
fn generated_text(body: &Value) -> Option<&str> {
    let item = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    item.get("generated_text").and_then(Value::as_str)
}
