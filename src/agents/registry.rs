//! Named agent slots and their in-flight task counters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    InboxAgent,
    PoTracker,
    ChangeManager,
    RoutingAgent,
}

impl AgentId {
    pub const ALL: [AgentId; 4] = [
        AgentId::InboxAgent,
        AgentId::PoTracker,
        AgentId::ChangeManager,
        AgentId::RoutingAgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::InboxAgent => "inbox_agent",
            AgentId::PoTracker => "po_tracker",
            AgentId::ChangeManager => "change_manager",
            AgentId::RoutingAgent => "routing_agent",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentId::InboxAgent => "Inbox Agent",
            AgentId::PoTracker => "PO Tracker Agent",
            AgentId::ChangeManager => "Change Manager Agent",
            AgentId::RoutingAgent => "Routing Agent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentId::InboxAgent => "Parses emails and extracts entities",
            AgentId::PoTracker => "Tracks purchase orders and delivery dates",
            AgentId::ChangeManager => "Handles price and quantity changes",
            AgentId::RoutingAgent => "Routes emails to appropriate agents",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Agent {0} not found")]
pub struct UnknownAgentError(pub String);

impl FromStr for AgentId {
    type Err = UnknownAgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownAgentError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Active,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Idle => f.write_str("idle"),
            AgentStatus::Active => f.write_str("active"),
        }
    }
}

/// Point-in-time view of one agent slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentDescriptor {
    pub id: AgentId,
    pub display_name: &'static str,
    pub status: AgentStatus,
    pub active_task_count: usize,
    pub description: &'static str,
}

impl AgentDescriptor {
    fn new(id: AgentId, active_task_count: usize) -> Self {
        Self {
            id,
            display_name: id.display_name(),
            // Active exactly while some task is in flight
            status: if active_task_count > 0 {
                AgentStatus::Active
            } else {
                AgentStatus::Idle
            },
            active_task_count,
            description: id.description(),
        }
    }
}

/// Tracks how many tasks each agent is working on.
///
/// Every counter starts at zero, all updates go through one lock and a
/// decrement never takes a counter below zero.
#[derive(Debug)]
pub struct AgentRegistry {
    active: Mutex<BTreeMap<AgentId, usize>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(AgentId::ALL.iter().map(|id| (*id, 0)).collect()),
        }
    }

    /// Mark `agent` busy until the returned guard is dropped
    pub fn begin(&self, agent: AgentId) -> ActiveTaskGuard<'_> {
        self.enter(agent);
        ActiveTaskGuard {
            registry: self,
            agent,
        }
    }

    pub fn enter(&self, agent: AgentId) -> usize {
        let mut active = self.active();
        let count = active.entry(agent).or_insert(0);
        *count += 1;
        debug!(%agent, active_tasks = *count, "agent task started");
        *count
    }

    pub fn exit(&self, agent: AgentId) -> usize {
        let mut active = self.active();
        let count = active.entry(agent).or_insert(0);
        if *count == 0 {
            warn!(%agent, "agent task finished with no task in flight");
        }
        *count = count.saturating_sub(1);
        debug!(%agent, active_tasks = *count, "agent task finished");
        *count
    }

    pub fn descriptor(&self, agent: AgentId) -> AgentDescriptor {
        let count = self.active().get(&agent).copied().unwrap_or(0);
        AgentDescriptor::new(agent, count)
    }

    /// All agents in registry order
    pub fn snapshot(&self) -> Vec<AgentDescriptor> {
        let active = self.active();
        AgentId::ALL
            .iter()
            .map(|id| AgentDescriptor::new(*id, active.get(id).copied().unwrap_or(0)))
            .collect()
    }

    fn active(&self) -> MutexGuard<'_, BTreeMap<AgentId, usize>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases an agent's task slot when dropped, including on early return,
/// `?` propagation and panics.
#[must_use = "the agent is released as soon as the guard is dropped"]
pub struct ActiveTaskGuard<'a> {
    registry: &'a AgentRegistry,
    agent: AgentId,
}

impl ActiveTaskGuard<'_> {
    pub fn agent(&self) -> AgentId {
        self.agent
    }
}

impl Drop for ActiveTaskGuard<'_> {
    fn drop(&mut self) {
        self.registry.exit(self.agent);
    }
}
