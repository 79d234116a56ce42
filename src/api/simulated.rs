//! Deterministic offline provider

use super::{Completion, InferenceProvider, ProviderError, TierModels, TokenUsage};
use crate::optimization::{estimate_tokens, ModelTier};
use async_trait::async_trait;

/// Answers every prompt with a canned, tier-specific response.
///
/// Used when no real provider is configured, so the whole pipeline can run
/// without network access. Costs are computed from estimated token counts at
/// the real tier rates.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProvider {
    models: TierModels,
}

impl SimulatedProvider {
    pub fn new(models: TierModels) -> Self {
        Self { models }
    }

    pub fn response_for(&self, tier: ModelTier) -> String {
        let model = self.models.model_for(tier);
        match tier {
            ModelTier::Small => format!("Mock response from {}", model),
            ModelTier::Medium => format!("Detailed mock response from {}", model),
            ModelTier::Large => format!("Comprehensive mock response from {} with reasoning", model),
        }
    }
}

#[async_trait]
impl InferenceProvider for SimulatedProvider {
    async fn invoke(&self, tier: ModelTier, prompt: &str) -> Result<Completion, ProviderError> {
        let text = self.response_for(tier);
        let usage = TokenUsage::new(estimate_tokens(prompt), estimate_tokens(&text));
        Ok(Completion::priced(text, usage, tier, self.models.model_for(tier)))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
