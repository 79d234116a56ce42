//! Request orchestration
//!
//! Drives each inbound request through the workflow:
//! - **Parse/classify**: external collaborators, under the inbox agent
//! - **Route**: fixed intent table, under the routing agent
//! - **Execute**: the destination agent's stage workflow, which calls the
//!   cost optimizer
//!
//! Every step is recorded in the [`EventLedger`] under the request's execution id.

mod stages;
mod workflow;

pub use stages::{route, StageAction, StageInput, StageResult, StageRunner, DEFAULT_DESTINATION, ROUTING_TABLE};
pub use workflow::{IllegalTransition, WorkflowRun, WorkflowState};

use crate::agents::{
    AgentId, AgentRegistry, AgentStatus, Entities, EntityExtractor, IntentClassifier, IntentResult,
    UnknownAgentError,
};
use crate::api::ProviderError;
use crate::metrics::StatsSummary;
use crate::observability::{EventLedger, NewEvent, Outcome};
use crate::optimization::CostOptimizer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Agent name used for request-level failures
pub const ORCHESTRATOR_AGENT: &str = "orchestrator";

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("{stage} failed: {message}")]
    Collaborator { stage: &'static str, message: String },

    #[error("Provider failure: {0}")]
    Provider(#[from] ProviderError),

    #[error("Agent {0} not found")]
    UnknownAgent(String),

    #[error("Illegal state transition: {from} -> {to}")]
    IllegalTransition { from: WorkflowState, to: WorkflowState },
}

impl From<IllegalTransition> for OrchestratorError {
    fn from(e: IllegalTransition) -> Self {
        OrchestratorError::IllegalTransition { from: e.from, to: e.to }
    }
}

impl From<UnknownAgentError> for OrchestratorError {
    fn from(e: UnknownAgentError) -> Self {
        OrchestratorError::UnknownAgent(e.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundRequest {
    pub sender: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

impl InboundRequest {
    pub fn new(sender: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
            received_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub execution_id: String,
    pub intent: String,
    pub routed_agent: AgentId,
    pub entities: Entities,
    pub stage_result: StageResult,
    pub total_cost: f64,
    pub duration_ms: f64,
    /// Workflow states visited, in order
    pub states: Vec<WorkflowState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStatusReport {
    pub id: AgentId,
    pub name: &'static str,
    pub status: AgentStatus,
    pub active_tasks: usize,
    pub total_cost: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideAck {
    pub status: &'static str,
    pub agent: AgentId,
}

/// Correlation id shared by every event of one request
pub fn new_execution_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("exec_{}_{}", Utc::now().timestamp(), &suffix[..8])
}

pub struct Orchestrator {
    extractor: Arc<dyn EntityExtractor>,
    classifier: Arc<dyn IntentClassifier>,
    optimizer: CostOptimizer,
    ledger: EventLedger,
    registry: AgentRegistry,
}

impl Orchestrator {
    pub fn new(
        extractor: Arc<dyn EntityExtractor>,
        classifier: Arc<dyn IntentClassifier>,
        optimizer: CostOptimizer,
        ledger: EventLedger,
    ) -> Self {
        Self {
            extractor,
            classifier,
            optimizer,
            ledger,
            registry: AgentRegistry::new(),
        }
    }

    /// Process one request end to end.
    ///
    /// On failure a failure event is logged under [`ORCHESTRATOR_AGENT`] and the
    /// error is returned; no partial result is ever produced.
    pub async fn process_request(&self, request: InboundRequest) -> Result<ProcessResult, OrchestratorError> {
        let mut run = WorkflowRun::new(new_execution_id());
        info!(execution_id = run.execution_id(), sender = %request.sender, "processing request");

        match self.drive(&request, &mut run).await {
            Ok(result) => {
                info!(
                    execution_id = %result.execution_id,
                    intent = %result.intent,
                    routed_agent = %result.routed_agent,
                    cost = result.total_cost,
                    "request completed"
                );
                Ok(result)
            }
            Err(e) => {
                let failed_in = run.current();
                run.fail();
                warn!(execution_id = run.execution_id(), state = %failed_in, error = %e, "request failed");
                self.ledger.log_event(
                    NewEvent::new(ORCHESTRATOR_AGENT, "process_request")
                        .context(&json!({ "error": e.to_string(), "state": failed_in }))
                        .outcome(Outcome::Failure)
                        .duration_ms(run.elapsed_ms())
                        .execution_id(run.execution_id()),
                );
                Err(e)
            }
        }
    }

    async fn drive(&self, request: &InboundRequest, run: &mut WorkflowRun) -> Result<ProcessResult, OrchestratorError> {
        let execution_id = run.execution_id().to_string();

        let (entities, intent) = {
            let _inbox = self.registry.begin(AgentId::InboxAgent);
            let entities = self.parse(request, &execution_id).await?;
            run.advance(WorkflowState::Parsed)?;
            let intent = self.classify(request, &execution_id).await?;
            run.advance(WorkflowState::Classified)?;
            (entities, intent)
        };

        let destination = {
            let _routing = self.registry.begin(AgentId::RoutingAgent);
            let destination = route(&intent.intent);
            self.ledger.log_decision(
                AgentId::RoutingAgent.as_str(),
                &format!("route_to_{}", destination),
                &format!(
                    "Intent: {}, PO: {}",
                    intent.intent,
                    entities.po_number.as_deref().unwrap_or("N/A")
                ),
                &json!({ "intent": intent, "entities": entities }),
                Some(execution_id.as_str()),
            );
            run.advance(WorkflowState::Routed)?;
            destination
        };

        run.advance(WorkflowState::Executing)?;
        let stage_result = {
            let _stage = self.registry.begin(destination);
            StageRunner::new(&self.optimizer, &self.ledger)
                .run(
                    destination,
                    StageInput {
                        intent: &intent,
                        entities: &entities,
                        sender: &request.sender,
                        execution_id: &execution_id,
                    },
                )
                .await?
        };
        run.advance(WorkflowState::Completed)?;

        Ok(ProcessResult {
            execution_id,
            intent: intent.intent,
            routed_agent: destination,
            entities,
            total_cost: stage_result.cost,
            stage_result,
            duration_ms: run.elapsed_ms(),
            states: run.history().to_vec(),
        })
    }

    async fn parse(&self, request: &InboundRequest, execution_id: &str) -> Result<Entities, OrchestratorError> {
        let started = Instant::now();
        let result = self.extractor.extract(&request.body, &request.subject).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let event = NewEvent::new(AgentId::InboxAgent.as_str(), "parse_email")
            .duration_ms(duration_ms)
            .execution_id(execution_id);

        match result {
            Ok(entities) => {
                self.ledger.log_event(event.context(&json!({
                    "sender": request.sender,
                    "subject": request.subject,
                    "received_at": request.received_at,
                })));
                Ok(entities)
            }
            Err(e) => {
                let message = e.to_string();
                self.ledger.log_event(
                    event
                        .context(&json!({ "sender": request.sender, "error": message }))
                        .outcome(Outcome::Failure),
                );
                Err(OrchestratorError::Collaborator {
                    stage: "entity extraction",
                    message,
                })
            }
        }
    }

    async fn classify(&self, request: &InboundRequest, execution_id: &str) -> Result<IntentResult, OrchestratorError> {
        let started = Instant::now();
        let result = self.classifier.classify(&request.subject, &request.body).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let event = NewEvent::new(AgentId::InboxAgent.as_str(), "classify_intent")
            .duration_ms(duration_ms)
            .execution_id(execution_id);

        match result {
            Ok(intent) => {
                self.ledger.log_event(event.context(&json!({
                    "intent": intent.intent,
                    "confidence": intent.confidence,
                })));
                Ok(intent)
            }
            Err(e) => {
                let message = e.to_string();
                self.ledger
                    .log_event(event.context(&json!({ "error": message })).outcome(Outcome::Failure));
                Err(OrchestratorError::Collaborator {
                    stage: "intent classification",
                    message,
                })
            }
        }
    }

    /// Current status of every agent with its ledger totals
    pub fn agent_statuses(&self) -> Vec<AgentStatusReport> {
        self.registry
            .snapshot()
            .into_iter()
            .map(|agent| {
                let metrics = self.ledger.agent_metrics(agent.id.as_str());
                AgentStatusReport {
                    id: agent.id,
                    name: agent.display_name,
                    status: agent.status,
                    active_tasks: agent.active_task_count,
                    total_cost: metrics.as_ref().map_or(0.0, |m| m.total_cost),
                    success_rate: metrics.as_ref().map_or(0.0, |m| m.success_rate),
                }
            })
            .collect()
    }

    /// Record a human override of `agent_id`'s latest decision
    pub fn override_decision(&self, agent_id: &str, decision: &str, reason: &str) -> Result<OverrideAck, OrchestratorError> {
        let agent: AgentId = agent_id.parse()?;
        self.ledger.log_override(agent.as_str(), decision, reason);
        info!(%agent, decision, "decision overridden");
        Ok(OverrideAck {
            status: "overridden",
            agent,
        })
    }

    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    pub fn optimizer(&self) -> &CostOptimizer {
        &self.optimizer
    }

    pub fn optimizer_stats(&self) -> StatsSummary {
        self.optimizer.stats()
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }
}
