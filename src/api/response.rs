//! Provider response structures

use crate::optimization::ModelTier;
use serde::{Deserialize, Serialize};

/// Text produced by a provider call together with what it cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated content
    pub text: String,

    /// Cost of the call in USD
    pub cost: f64,

    /// Token usage statistics
    pub usage: TokenUsage,

    /// Model that generated the response
    pub model: String,
}

impl Completion {
    /// Build a completion priced from `usage` at `tier` rates
    pub fn priced(text: impl Into<String>, usage: TokenUsage, tier: ModelTier, model: impl Into<String>) -> Self {
        let usage = usage.with_cost(tier);
        Self {
            text: text.into(),
            cost: usage.estimated_cost_usd.unwrap_or(0.0),
            usage,
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the response
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
    /// Estimated cost in USD (if available)
    pub estimated_cost_usd: Option<f64>,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            estimated_cost_usd: None,
        }
    }

    pub fn with_cost(mut self, tier: ModelTier) -> Self {
        self.estimated_cost_usd = Some(tier.cost(self.prompt_tokens, self.completion_tokens));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priced_completion_uses_tier_rates() {
        let completion = Completion::priced(
            "ok",
            TokenUsage::new(1000, 1000),
            ModelTier::Medium,
            "gpt-3.5-turbo-16k",
        );
        assert!((completion.cost - 0.007).abs() < 1e-12);
        assert_eq!(completion.usage.total_tokens, 2000);
        assert_eq!(completion.usage.estimated_cost_usd, Some(completion.cost));
    }
}
