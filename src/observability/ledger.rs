//! Bounded event ledger with running per-agent accumulators

use super::{percentage, AgentMetrics, Event, GlobalMetrics, LedgerConfig, Outcome};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// An event about to be logged
#[derive(Debug, Clone)]
pub struct NewEvent {
    agent: String,
    action: String,
    context: String,
    outcome: Outcome,
    cost: f64,
    duration_ms: f64,
    execution_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl NewEvent {
    pub fn new(agent: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            action: action.into(),
            context: "{}".to_string(),
            outcome: Outcome::Success,
            cost: 0.0,
            duration_ms: 0.0,
            execution_id: None,
            timestamp: None,
        }
    }

    /// Attach a payload. Never fails: a value that cannot be serialized is
    /// stored as its debug rendering.
    pub fn context<T>(mut self, value: &T) -> Self
    where
        T: Serialize + Debug + ?Sized,
    {
        self.context = serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value));
        self
    }

    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    /// Record the event with an explicit timestamp instead of now (replay)
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Default, Clone)]
struct AgentAccumulator {
    successful_actions: u64,
    failed_actions: u64,
    total_cost: f64,
    total_time_ms: f64,
    overrides: u64,
}

impl AgentAccumulator {
    fn total_actions(&self) -> u64 {
        self.successful_actions + self.failed_actions
    }

    fn record(&mut self, event: &Event) {
        match event.outcome {
            Outcome::Success => self.successful_actions += 1,
            Outcome::Failure => self.failed_actions += 1,
            Outcome::Overridden => {}
        }
        self.total_cost += event.cost;
        self.total_time_ms += event.duration_ms;
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    events: VecDeque<Event>,
    accumulators: HashMap<String, AgentAccumulator>,
    /// Events ever logged, source of auto-generated execution ids
    sequence: u64,
}

/// Append-only, bounded log of agent events.
///
/// Appends, truncation and accumulator updates happen under one lock, so
/// concurrent loggers never lose an event or a count.
#[derive(Debug)]
pub struct EventLedger {
    state: Mutex<LedgerState>,
    config: LedgerConfig,
}

impl EventLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Append an event and update its agent's accumulator
    pub fn log_event(&self, new: NewEvent) -> Event {
        self.append(&mut self.state(), new)
    }

    fn append(&self, state: &mut LedgerState, new: NewEvent) -> Event {
        let execution_id = new
            .execution_id
            .unwrap_or_else(|| format!("exec_{}", state.sequence));
        state.sequence += 1;

        let event = Event {
            timestamp: new.timestamp.unwrap_or_else(Utc::now),
            agent: new.agent,
            action: new.action,
            context: new.context,
            outcome: new.outcome,
            cost: new.cost,
            duration_ms: new.duration_ms,
            execution_id,
        };

        state
            .accumulators
            .entry(event.agent.clone())
            .or_default()
            .record(&event);
        state.events.push_back(event.clone());

        let mut truncated = 0usize;
        while state.events.len() > self.config.capacity {
            state.events.pop_front();
            truncated += 1;
        }
        if truncated > 0 {
            debug!(truncated, capacity = self.config.capacity, "ledger truncated");
        }

        event
    }

    /// Log a decision together with the reasoning and inputs behind it
    pub fn log_decision<T>(
        &self,
        agent: &str,
        decision: &str,
        reasoning: &str,
        inputs: &T,
        execution_id: Option<&str>,
    ) -> Event
    where
        T: Serialize + Debug + ?Sized,
    {
        let inputs = serde_json::to_value(inputs).unwrap_or_else(|_| json!(format!("{:?}", inputs)));
        let mut event = NewEvent::new(agent, format!("decision: {}", decision)).context(&json!({
            "reasoning": reasoning,
            "inputs": inputs,
            "decision": decision,
        }));
        if let Some(id) = execution_id {
            event = event.execution_id(id);
        }
        self.log_event(event)
    }

    /// Record a human override of an agent's decision
    pub fn log_override(&self, agent: &str, original_decision: &str, override_reason: &str) -> Event {
        let event = NewEvent::new(agent, "override")
            .context(&json!({
                "original_decision": original_decision,
                "override_reason": override_reason,
            }))
            .outcome(Outcome::Overridden);

        let mut state = self.state();
        state
            .accumulators
            .entry(agent.to_string())
            .or_default()
            .overrides += 1;
        self.append(&mut state, event)
    }

    /// Most recent events first, optionally for one agent only
    pub fn timeline(&self, limit: usize, agent: Option<&str>) -> Vec<Event> {
        let state = self.state();
        let mut events: Vec<Event> = state
            .events
            .iter()
            .rev()
            .filter(|event| agent.map_or(true, |name| event.agent == name))
            .cloned()
            .collect();
        drop(state);

        // Stable, so equal timestamps keep newest-insert-first order
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit);
        events
    }

    /// Metrics for one agent, `None` if it never logged anything
    pub fn agent_metrics(&self, agent: &str) -> Option<AgentMetrics> {
        let state = self.state();
        let acc = state.accumulators.get(agent)?;
        let total = acc.total_actions();

        Some(AgentMetrics {
            agent: agent.to_string(),
            total_actions: total,
            success_rate: percentage(acc.successful_actions, total),
            failure_rate: percentage(acc.failed_actions, total),
            avg_response_time_ms: if total == 0 {
                0.0
            } else {
                acc.total_time_ms / total as f64
            },
            total_cost: acc.total_cost,
            overrides: acc.overrides,
            override_rate: percentage(acc.overrides, total),
        })
    }

    pub fn global_metrics(&self) -> GlobalMetrics {
        self.global_metrics_at(Utc::now())
    }

    /// Global metrics as seen from `now`
    pub fn global_metrics_at(&self, now: DateTime<Utc>) -> GlobalMetrics {
        let state = self.state();
        let window = self.recent_window();

        let total = state.events.len();
        let successes = state
            .events
            .iter()
            .filter(|event| event.outcome == Outcome::Success)
            .count();
        let events_last_hour = state
            .events
            .iter()
            .filter(|event| now.signed_duration_since(event.timestamp) < window)
            .count();

        GlobalMetrics {
            total_processed: total,
            success_rate: percentage(successes as u64, total as u64),
            total_cost: state.accumulators.values().map(|acc| acc.total_cost).sum(),
            agent_count: state.accumulators.len(),
            events_last_hour,
        }
    }

    /// Configured window, saturating at the largest span chrono can hold
    fn recent_window(&self) -> TimeDelta {
        i64::try_from(self.config.recent_window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// Names of every agent that has logged at least one event, sorted
    pub fn agents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().accumulators.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ledger(capacity: usize) -> EventLedger {
        EventLedger::new(LedgerConfig {
            capacity,
            ..LedgerConfig::default()
        })
    }

    #[test]
    fn test_success_rate_matches_counts() {
        let ledger = EventLedger::default();
        for _ in 0..7 {
            ledger.log_event(NewEvent::new("po_tracker", "escalate_if_critical"));
        }
        for _ in 0..3 {
            ledger.log_event(NewEvent::new("po_tracker", "update_erp").outcome(Outcome::Failure));
        }

        let metrics = ledger.agent_metrics("po_tracker").unwrap();
        assert_eq!(metrics.total_actions, 10);
        assert_eq!(metrics.success_rate, 70.0);
        assert_eq!(metrics.failure_rate, 30.0);
    }

    #[test]
    fn test_auto_execution_ids_are_sequential() {
        let ledger = EventLedger::default();
        let first = ledger.log_event(NewEvent::new("inbox_agent", "parse_email"));
        let second = ledger.log_event(NewEvent::new("inbox_agent", "parse_email").execution_id("exec_req"));
        let third = ledger.log_event(NewEvent::new("inbox_agent", "parse_email"));

        assert_eq!(first.execution_id, "exec_0");
        assert_eq!(second.execution_id, "exec_req");
        assert_eq!(third.execution_id, "exec_2");
    }

    #[test]
    fn test_truncation_keeps_newest_but_metrics_keep_counting() {
        let ledger = ledger(5);
        for n in 0..8 {
            ledger.log_event(
                NewEvent::new("inbox_agent", format!("action_{}", n))
                    .cost(0.01)
                    .duration_ms(2.0),
            );
        }

        assert_eq!(ledger.len(), 5);
        let actions: Vec<String> = ledger
            .timeline(10, None)
            .into_iter()
            .map(|event| event.action)
            .collect();
        assert_eq!(
            actions,
            vec!["action_7", "action_6", "action_5", "action_4", "action_3"]
        );

        let metrics = ledger.agent_metrics("inbox_agent").unwrap();
        assert_eq!(metrics.total_actions, 8);
        assert!((metrics.total_cost - 0.08).abs() < 1e-9);
        assert_eq!(metrics.avg_response_time_ms, 2.0);
        assert_eq!(ledger.global_metrics().total_processed, 5);
    }

    #[test]
    fn test_timeline_filters_and_limits() {
        let ledger = EventLedger::default();
        let base = Utc::now();
        ledger.log_event(NewEvent::new("inbox_agent", "a").at(base));
        ledger.log_event(NewEvent::new("po_tracker", "b").at(base + chrono::Duration::seconds(2)));
        ledger.log_event(NewEvent::new("po_tracker", "c").at(base + chrono::Duration::seconds(1)));
        ledger.log_event(NewEvent::new("po_tracker", "d").at(base + chrono::Duration::seconds(3)));

        let timeline = ledger.timeline(2, Some("po_tracker"));
        let actions: Vec<&str> = timeline.iter().map(|event| event.action.as_str()).collect();
        assert_eq!(actions, vec!["d", "b"]);

        assert!(ledger.timeline(10, Some("routing_agent")).is_empty());
        assert_eq!(ledger.timeline(0, None).len(), 0);
    }

    #[test]
    fn test_decision_event_embeds_provenance() {
        let ledger = EventLedger::default();
        let event = ledger.log_decision(
            "routing_agent",
            "route_to_po_tracker",
            "Intent delivery_delay maps to po_tracker",
            &json!({"intent": "delivery_delay", "confidence": 0.33}),
            Some("exec_42"),
        );

        assert_eq!(event.action, "decision: route_to_po_tracker");
        assert_eq!(event.execution_id, "exec_42");
        let context: serde_json::Value = serde_json::from_str(&event.context).unwrap();
        assert_eq!(context["decision"], "route_to_po_tracker");
        assert_eq!(context["inputs"]["intent"], "delivery_delay");
        assert_eq!(context["reasoning"], "Intent delivery_delay maps to po_tracker");
    }

    #[test]
    fn test_overrides_are_counted_separately() {
        let ledger = EventLedger::default();
        ledger.log_event(NewEvent::new("change_manager", "requires_approval"));
        ledger.log_event(NewEvent::new("change_manager", "log_change"));
        let event = ledger.log_override("change_manager", "requires_approval", "Buyer approved by phone");

        assert_eq!(event.outcome, Outcome::Overridden);
        assert_eq!(event.action, "override");

        let metrics = ledger.agent_metrics("change_manager").unwrap();
        assert_eq!(metrics.total_actions, 2);
        assert_eq!(metrics.success_rate, 100.0);
        assert_eq!(metrics.overrides, 1);
        assert_eq!(metrics.override_rate, 50.0);

        // Overridden events are not successes
        let global = ledger.global_metrics();
        assert_eq!(global.total_processed, 3);
        assert!((global.success_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_override_only_agent_has_zero_rates() {
        let ledger = EventLedger::default();
        ledger.log_override("po_tracker", "update_erp", "manual fix");

        let metrics = ledger.agent_metrics("po_tracker").unwrap();
        assert_eq!(metrics.total_actions, 0);
        assert_eq!(metrics.success_rate, 0.0);
        assert_eq!(metrics.override_rate, 0.0);
        assert_eq!(metrics.avg_response_time_ms, 0.0);
    }

    #[test]
    fn test_unknown_agent_has_no_metrics() {
        assert!(EventLedger::default().agent_metrics("nobody").is_none());
    }

    #[test]
    fn test_events_last_hour_uses_trailing_window() {
        let ledger = EventLedger::default();
        let now = Utc::now();
        ledger.log_event(NewEvent::new("inbox_agent", "old").at(now - chrono::Duration::seconds(7200)));
        ledger.log_event(NewEvent::new("inbox_agent", "edge").at(now - chrono::Duration::seconds(3600)));
        ledger.log_event(NewEvent::new("inbox_agent", "recent").at(now - chrono::Duration::seconds(60)));
        ledger.log_event(NewEvent::new("po_tracker", "fresh").at(now).cost(0.5));

        let global = ledger.global_metrics_at(now);
        assert_eq!(global.events_last_hour, 2);
        assert_eq!(global.agent_count, 2);
        assert_eq!(global.total_cost, 0.5);
    }

    #[test]
    fn test_oversized_window_saturates() {
        let now = Utc::now();
        for secs in [10_000_000_000_000_000, u64::MAX] {
            let ledger = EventLedger::new(LedgerConfig {
                recent_window_secs: secs,
                ..LedgerConfig::default()
            });
            ledger.log_event(NewEvent::new("inbox_agent", "ancient").at(now - chrono::Duration::days(365 * 50)));
            ledger.log_event(NewEvent::new("inbox_agent", "fresh").at(now));

            assert_eq!(ledger.global_metrics_at(now).events_last_hour, 2);
        }
    }

    #[test]
    fn test_override_count_never_runs_ahead_of_its_events() {
        let ledger = EventLedger::default();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for n in 0..200 {
                    ledger.log_override("change_manager", "requires_approval", &format!("reason {}", n));
                }
            });
            scope.spawn(|| {
                for _ in 0..500 {
                    let overrides = ledger.agent_metrics("change_manager").map_or(0, |m| m.overrides);
                    let logged = ledger.timeline(1000, Some("change_manager")).len() as u64;
                    assert!(overrides <= logged, "{} overrides but {} events", overrides, logged);
                }
            });
        });

        assert_eq!(ledger.agent_metrics("change_manager").unwrap().overrides, 200);
    }

    #[test]
    fn test_agents_lists_every_logger_once() {
        let ledger = EventLedger::default();
        ledger.log_event(NewEvent::new("po_tracker", "update_erp"));
        ledger.log_event(NewEvent::new("inbox_agent", "parse_email"));
        ledger.log_override("po_tracker", "update_erp", "manual fix");

        assert_eq!(ledger.agents(), vec!["inbox_agent", "po_tracker"]);
    }

    #[test]
    fn test_unserializable_context_is_stringified() {
        // JSON object keys must be strings, so tuple keys fail to serialize
        let mut context = HashMap::new();
        context.insert((1, 2), "pair");

        let ledger = EventLedger::default();
        let event = ledger.log_event(NewEvent::new("inbox_agent", "parse_email").context(&context));

        assert!(event.context.contains("(1, 2)"));
        assert!(event.context.contains("pair"));
    }

    #[test]
    fn test_global_metrics_empty_ledger() {
        let global = EventLedger::default().global_metrics();
        assert_eq!(global.total_processed, 0);
        assert_eq!(global.success_rate, 0.0);
        assert_eq!(global.agent_count, 0);
    }

    #[test]
    fn test_concurrent_logging_loses_nothing() {
        let ledger = Arc::new(ledger(50));

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let ledger = Arc::clone(&ledger);
                scope.spawn(move || {
                    for n in 0..100 {
                        let outcome = if n % 4 == 0 { Outcome::Failure } else { Outcome::Success };
                        ledger.log_event(
                            NewEvent::new("po_tracker", format!("worker_{}", worker)).outcome(outcome),
                        );
                    }
                });
            }
        });

        assert_eq!(ledger.len(), 50);
        let metrics = ledger.agent_metrics("po_tracker").unwrap();
        assert_eq!(metrics.total_actions, 800);
        assert_eq!(metrics.failure_rate, 25.0);
    }
}
