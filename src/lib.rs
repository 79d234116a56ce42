//! agent-relay - Route inbound requests through specialized agents at minimal inference cost
//!
//! This library provides the coordination layer between an inbound request and
//! the inference providers that help answer it.
//!
//! ## Key Features
//!
//! - **Tier Selection**: Pick the cheapest adequate model tier for each task type
//! - **Cascading Inference**: Try the small tier first and escalate only when needed
//! - **Response Caching**: Never pay twice for the same task
//! - **Observability**: Audit every agent action, decision and override
//! - **Orchestration**: Parse, classify, route and execute each request as a state machine

pub mod agents;
pub mod api;
pub mod cache;
pub mod config;
pub mod metrics;
pub mod observability;
pub mod optimization;
pub mod orchestrator;

pub use agents::{
    AgentId, AgentRegistry, AgentStatus, Entities, EntityExtractor, IntentClassifier, IntentResult,
    RuleBasedParser,
};
pub use api::{Completion, InferenceProvider, OpenAiProvider, ProviderError, SimulatedProvider};
pub use cache::{CacheKey, ResponseCache};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use metrics::{StatsSummary, StatsTracker};
pub use observability::{AgentMetrics, Event, EventLedger, GlobalMetrics, NewEvent, Outcome};
pub use optimization::{Answer, CostOptimizer, ModelTier, OptimizerConfig, TaskContext, TierSelector};
pub use orchestrator::{
    InboundRequest, Orchestrator, OrchestratorError, OverrideAck, ProcessResult, WorkflowState,
};
