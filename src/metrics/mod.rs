//! Running statistics for the cost optimizer

use crate::optimization::ModelTier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Assumed USD saved by every cache hit
pub const DEFAULT_SAVINGS_PER_HIT: f64 = 0.002;

/// Raw optimizer counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerStats {
    /// Lookups answered from the cache
    pub cache_hits: u64,
    /// Lookups that had to reach a provider
    pub cache_misses: u64,
    /// Total provider spend (USD)
    pub total_cost: f64,
    /// Accepted provider calls per tier
    pub calls_by_tier: BTreeMap<ModelTier, u64>,
}

impl Default for OptimizerStats {
    fn default() -> Self {
        Self {
            cache_hits: 0,
            cache_misses: 0,
            total_cost: 0.0,
            calls_by_tier: ModelTier::ALL.iter().map(|tier| (*tier, 0)).collect(),
        }
    }
}

impl OptimizerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.cache_misses += 1;
    }

    pub fn record_call(&mut self, tier: ModelTier, cost: f64) {
        *self.calls_by_tier.entry(tier).or_insert(0) += 1;
        self.total_cost += cost.max(0.0);
    }

    pub fn lookups(&self) -> u64 {
        self.cache_hits + self.cache_misses
    }

    /// Hit rate as a percentage, 0 when nothing was looked up yet
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.lookups();
        if lookups == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / lookups as f64 * 100.0
    }

    pub fn calls_for(&self, tier: ModelTier) -> u64 {
        self.calls_by_tier.get(&tier).copied().unwrap_or(0)
    }
}

/// Thread-safe stats tracker
#[derive(Clone)]
pub struct StatsTracker {
    inner: Arc<Mutex<OptimizerStats>>,
    savings_per_hit: f64,
}

impl StatsTracker {
    pub fn new(savings_per_hit: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OptimizerStats::new())),
            savings_per_hit,
        }
    }

    pub fn record_hit(&self) {
        self.stats().record_hit();
    }

    pub fn record_miss(&self) {
        self.stats().record_miss();
    }

    pub fn record_call(&self, tier: ModelTier, cost: f64) {
        self.stats().record_call(tier, cost);
    }

    pub fn get_stats(&self) -> OptimizerStats {
        self.stats().clone()
    }

    pub fn summary(&self) -> StatsSummary {
        let stats = self.get_stats();
        StatsSummary {
            cache_hit_rate: stats.cache_hit_rate(),
            cache_hits: stats.cache_hits,
            cache_misses: stats.cache_misses,
            total_cost: stats.total_cost,
            estimated_savings: stats.cache_hits as f64 * self.savings_per_hit,
            calls_by_tier: stats.calls_by_tier,
        }
    }

    fn stats(&self) -> MutexGuard<'_, OptimizerStats> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SAVINGS_PER_HIT)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub cache_hit_rate: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_cost: f64,
    pub calls_by_tier: BTreeMap<ModelTier, u64>,
    pub estimated_savings: f64,
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Cost Optimization Stats ===")?;
        writeln!(f, "Cache hit rate: {:.1}%", self.cache_hit_rate)?;
        writeln!(f, "Cache hits: {}", self.cache_hits)?;
        writeln!(f, "Cache misses: {}", self.cache_misses)?;
        writeln!(f, "Total cost: ${:.4}", self.total_cost)?;
        for (tier, calls) in &self.calls_by_tier {
            writeln!(f, "Calls ({}): {}", tier, calls)?;
        }
        writeln!(f, "Estimated savings: ${:.4}", self.estimated_savings)?;
        Ok(())
    }
}
