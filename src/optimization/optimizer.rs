//! Cache-first, cascading answer path

use super::{is_cascade_eligible, ModelTier, TaskContext, TierSelector};
use crate::api::{Completion, InferenceProvider, ProviderError};
use crate::cache::{CacheKey, ResponseCache, DEFAULT_CACHE_CAPACITY};
use crate::metrics::{StatsSummary, StatsTracker, DEFAULT_SAVINGS_PER_HIT};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Responses with this many characters or fewer are treated as inadequate.
///
/// Placeholder heuristic; it says nothing about the quality of an answer.
pub const DEFAULT_MIN_ADEQUATE_CHARS: usize = 10;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub cache_capacity: usize,
    pub min_adequate_chars: usize,
    pub savings_per_hit: f64,
    pub provider_timeout: Duration,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            min_adequate_chars: DEFAULT_MIN_ADEQUATE_CHARS,
            savings_per_hit: DEFAULT_SAVINGS_PER_HIT,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

/// Outcome of the speculative small-tier attempt
#[derive(Debug)]
pub enum AttemptResult {
    Adequate(Completion),
    Inadequate(Completion),
    Failed(ProviderError),
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub response: String,
    pub cost: f64,
    /// Tier that produced the response; `None` when served from the cache
    pub tier: Option<ModelTier>,
    pub from_cache: bool,
}

impl Answer {
    fn cached(response: String) -> Self {
        Self {
            response,
            cost: 0.0,
            tier: None,
            from_cache: true,
        }
    }

    fn fresh(completion: Completion, tier: ModelTier) -> Self {
        Self {
            response: completion.text,
            cost: completion.cost.max(0.0),
            tier: Some(tier),
            from_cache: false,
        }
    }
}

/// Answers tasks as cheaply as possible: cache, then cascade, then the
/// selected tier.
pub struct CostOptimizer {
    provider: Arc<dyn InferenceProvider>,
    cache: ResponseCache,
    stats: StatsTracker,
    selector: TierSelector,
    config: OptimizerConfig,
}

impl CostOptimizer {
    pub fn new(provider: Arc<dyn InferenceProvider>, config: OptimizerConfig) -> Self {
        Self {
            provider,
            cache: ResponseCache::new(config.cache_capacity),
            stats: StatsTracker::new(config.savings_per_hit),
            selector: TierSelector::new(),
            config,
        }
    }

    pub async fn answer(
        &self,
        task_type: &str,
        prompt: &str,
        context: &TaskContext,
        forced_tier: Option<ModelTier>,
    ) -> Result<Answer, ProviderError> {
        let key = CacheKey::derive(task_type, prompt, context);

        if let Some(response) = self.cache.lookup(&key) {
            self.stats.record_hit();
            debug!(task_type, %key, "cache hit");
            return Ok(Answer::cached(response));
        }
        self.stats.record_miss();
        debug!(task_type, %key, "cache miss");

        let tier = forced_tier.unwrap_or_else(|| self.selector.select(task_type, context));

        if forced_tier.is_none() && is_cascade_eligible(task_type) {
            match self.attempt_small(prompt).await {
                AttemptResult::Adequate(completion) => {
                    info!(task_type, selected = %tier, "cascade accepted small tier response");
                    return Ok(self.accept(key, completion, ModelTier::Small));
                }
                AttemptResult::Inadequate(completion) => {
                    debug!(
                        task_type,
                        chars = completion.text.chars().count(),
                        escalate_to = %tier,
                        "small tier response inadequate, escalating"
                    );
                }
                AttemptResult::Failed(e) => {
                    warn!(task_type, escalate_to = %tier, error = %e, "small tier attempt failed, escalating");
                }
            }
        }

        let completion = self.invoke(tier, prompt).await?;
        Ok(self.accept(key, completion, tier))
    }

    /// Speculative call at the cheapest tier. Never an error: failures are
    /// reported as [`AttemptResult::Failed`] so the caller can fall through.
    pub async fn attempt_small(&self, prompt: &str) -> AttemptResult {
        match self.invoke(ModelTier::Small, prompt).await {
            Ok(completion) if self.is_adequate(&completion.text) => AttemptResult::Adequate(completion),
            Ok(completion) => AttemptResult::Inadequate(completion),
            Err(e) => AttemptResult::Failed(e),
        }
    }

    pub fn is_adequate(&self, response: &str) -> bool {
        response.chars().count() > self.config.min_adequate_chars
    }

    pub fn stats(&self) -> StatsSummary {
        self.stats.summary()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    async fn invoke(&self, tier: ModelTier, prompt: &str) -> Result<Completion, ProviderError> {
        let timeout = self.config.provider_timeout;
        match tokio::time::timeout(timeout, self.provider.invoke(tier, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                tier,
                secs: timeout.as_secs(),
            }),
        }
    }

    fn accept(&self, key: CacheKey, completion: Completion, tier: ModelTier) -> Answer {
        let answer = Answer::fresh(completion, tier);
        self.stats.record_call(tier, answer.cost);
        self.cache.insert(key, answer.response.clone());
        answer
    }
}
