//! Inference provider abstraction
//!
//! The coordination core only needs one capability from a provider: given a
//! tier and a prompt, return a completion with its cost, or fail.

mod client;
mod response;
mod simulated;

pub use client::{OpenAiConfig, OpenAiProvider};
pub use response::{Completion, TokenUsage};
pub use simulated::SimulatedProvider;

use crate::optimization::ModelTier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("{tier} call timed out after {secs}s")]
    Timeout { tier: ModelTier, secs: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Simulated,
    OpenAI,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" | "mock" => Ok(Self::Simulated),
            "openai" => Ok(Self::OpenAI),
            other => Err(format!("unknown provider kind: {}", other)),
        }
    }
}

/// Model name served at each tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierModels {
    pub small: String,
    pub medium: String,
    pub large: String,
}

impl TierModels {
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Small => &self.small,
            ModelTier::Medium => &self.medium,
            ModelTier::Large => &self.large,
        }
    }
}

impl Default for TierModels {
    fn default() -> Self {
        Self {
            small: "gpt-3.5-turbo".to_string(),
            medium: "gpt-3.5-turbo-16k".to_string(),
            large: "gpt-4".to_string(),
        }
    }
}

/// Something that can answer a prompt at a given tier
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Run `prompt` on the model behind `tier`. The returned cost is never negative.
    async fn invoke(&self, tier: ModelTier, prompt: &str) -> Result<Completion, ProviderError>;

    fn name(&self) -> &str;
}
