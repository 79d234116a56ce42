//! Audit trail of agent actions, decisions and overrides
//!
//! Every step of every request lands in the [`EventLedger`] as an [`Event`].
//! The ledger keeps a bounded window of recent events for timeline queries
//! and a running per-agent accumulator for metrics, so metrics keep counting
//! events that have already been truncated out of the window.

mod ledger;

pub use ledger::{EventLedger, NewEvent};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_LEDGER_CAPACITY: usize = 1000;
pub const DEFAULT_RECENT_WINDOW_SECS: u64 = 3600;
pub const DEFAULT_TIMELINE_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Success,
    Failure,
    Overridden,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Overridden => "overridden",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded agent action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub action: String,
    /// Serialized JSON payload, or a debug rendering if it could not be serialized
    pub context: String,
    pub outcome: Outcome,
    pub cost: f64,
    pub duration_ms: f64,
    pub execution_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Events kept for timeline queries
    pub capacity: usize,
    /// Trailing window for `events_last_hour`
    pub recent_window_secs: u64,
    pub default_timeline_limit: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LEDGER_CAPACITY,
            recent_window_secs: DEFAULT_RECENT_WINDOW_SECS,
            default_timeline_limit: DEFAULT_TIMELINE_LIMIT,
        }
    }
}

/// Derived per-agent figures. Rates are percentages and 0 when the agent has
/// no success/failure actions yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentMetrics {
    pub agent: String,
    pub total_actions: u64,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub avg_response_time_ms: f64,
    pub total_cost: f64,
    pub overrides: u64,
    pub override_rate: f64,
}

impl fmt::Display for AgentMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Agent Metrics: {} ===", self.agent)?;
        writeln!(f, "Total actions: {}", self.total_actions)?;
        writeln!(f, "Success rate: {:.1}%", self.success_rate)?;
        writeln!(f, "Failure rate: {:.1}%", self.failure_rate)?;
        writeln!(f, "Avg response time: {:.1}ms", self.avg_response_time_ms)?;
        writeln!(f, "Total cost: ${:.4}", self.total_cost)?;
        writeln!(f, "Overrides: {} ({:.1}%)", self.overrides, self.override_rate)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalMetrics {
    /// Events currently held in the ledger window
    pub total_processed: usize,
    pub success_rate: f64,
    pub total_cost: f64,
    pub agent_count: usize,
    pub events_last_hour: usize,
}

impl fmt::Display for GlobalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== System Metrics ===")?;
        writeln!(f, "Events processed: {}", self.total_processed)?;
        writeln!(f, "Success rate: {:.1}%", self.success_rate)?;
        writeln!(f, "Total cost: ${:.4}", self.total_cost)?;
        writeln!(f, "Agents seen: {}", self.agent_count)?;
        writeln!(f, "Events last hour: {}", self.events_last_hour)?;
        Ok(())
    }
}

pub(crate) fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
