//! OpenAI-compatible chat completions client

use super::{Completion, InferenceProvider, ProviderError, TierModels, TokenUsage};
use crate::optimization::ModelTier;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub models: TierModels,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Provider backed by any endpoint speaking the OpenAI chat completions API
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_BASE_URL)
            .trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    fn build_request(&self, tier: ModelTier, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.config.models.model_for(tier),
            "messages": [{ "role": "user", "content": prompt }],
        });

        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }

    fn parse_response(&self, tier: ModelTier, body: &str) -> Result<Completion, ProviderError> {
        let response: Value = serde_json::from_str(body)?;
        let text = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::Provider("response has no message content".into()))?
            .to_string();

        let usage = TokenUsage::new(
            token_count(&response["usage"]["prompt_tokens"]),
            token_count(&response["usage"]["completion_tokens"]),
        );

        let model = response["model"]
            .as_str()
            .unwrap_or_else(|| self.config.models.model_for(tier))
            .to_string();

        Ok(Completion::priced(text, usage, tier, model))
    }
}

/// Missing counts are 0; counts beyond `u32` saturate
fn token_count(value: &Value) -> u32 {
    value
        .as_u64()
        .map_or(0, |count| u32::try_from(count).unwrap_or(u32::MAX))
}

#[async_trait]
impl InferenceProvider for OpenAiProvider {
    async fn invoke(&self, tier: ModelTier, prompt: &str) -> Result<Completion, ProviderError> {
        let url = self.endpoint();
        let body = self.build_request(tier, prompt);
        debug!(%tier, %url, "sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            let body = response.text().await?;
            self.parse_response(tier, &body)
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(ProviderError::Provider(format!("{}: {}", status, error_text)))
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}
