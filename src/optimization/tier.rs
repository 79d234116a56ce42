//! Model tiers, the token cost model and task-complexity routing

use super::TaskContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use tiktoken_rs::CoreBPE;

/// Structured single-field extraction, always answered by the small tier
pub const SIMPLE_TASKS: &[&str] = &["extract_po_number", "parse_date", "extract_quantity"];

/// Tasks whose tier depends on how much text they carry
pub const MEDIUM_TASKS: &[&str] = &["classify_intent", "extract_entities", "format_response"];

/// Tasks that need the most capable tier
pub const COMPLEX_TASKS: &[&str] = &["multi_step_reasoning", "decision_making", "coordination"];

/// Tasks too cheap for a speculative small-tier attempt to pay off
pub const NEVER_CASCADE_TASKS: &[&str] = &["extract_po_number", "parse_date"];

/// Medium tasks with less context text than this stay on the small tier
pub const MEDIUM_TEXT_THRESHOLD: usize = 500;

/// Inference capability/cost level, ordered cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelTier {
    Small,
    Medium,
    Large,
}

/// Price of a tier in USD per 1000 tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelTier {
    pub const ALL: [ModelTier; 3] = [ModelTier::Small, ModelTier::Medium, ModelTier::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Small => "SMALL",
            ModelTier::Medium => "MEDIUM",
            ModelTier::Large => "LARGE",
        }
    }

    pub fn pricing(self) -> TierPricing {
        match self {
            ModelTier::Small => TierPricing {
                input_per_1k: 0.0015,
                output_per_1k: 0.002,
            },
            ModelTier::Medium => TierPricing {
                input_per_1k: 0.003,
                output_per_1k: 0.004,
            },
            ModelTier::Large => TierPricing {
                input_per_1k: 0.03,
                output_per_1k: 0.06,
            },
        }
    }

    /// Cost in USD of a call with the given token counts
    pub fn cost(self, input_tokens: u32, output_tokens: u32) -> f64 {
        let pricing = self.pricing();
        (input_tokens as f64 / 1000.0) * pricing.input_per_1k
            + (output_tokens as f64 / 1000.0) * pricing.output_per_1k
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

thread_local! {
    static ENCODER: Option<CoreBPE> = tiktoken_rs::cl100k_base().ok();
}

/// Estimate the token count of `text`.
///
/// Uses the cl100k encoder when it can be built, otherwise ~4 chars per token.
pub fn estimate_tokens(text: &str) -> u32 {
    let count = ENCODER.with(|encoder| match encoder {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.chars().count() / 4,
    });
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Whether `task_type` may be tried on the small tier before its selected tier
pub fn is_cascade_eligible(task_type: &str) -> bool {
    !NEVER_CASCADE_TASKS.contains(&task_type)
}

/// Picks the minimum adequate tier for a task. First matching rule wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct TierSelector;

impl TierSelector {
    pub fn new() -> Self {
        Self
    }

    pub fn select(&self, task_type: &str, context: &TaskContext) -> ModelTier {
        if SIMPLE_TASKS.contains(&task_type) {
            return ModelTier::Small;
        }

        if MEDIUM_TASKS.contains(&task_type) {
            return if context.text_len() < MEDIUM_TEXT_THRESHOLD {
                ModelTier::Small
            } else {
                ModelTier::Medium
            };
        }

        if COMPLEX_TASKS.contains(&task_type) || context.requires_reasoning() {
            return ModelTier::Large;
        }

        ModelTier::Medium
    }
}
