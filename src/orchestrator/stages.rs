//! Routing table and per-agent stage workflows

use crate::agents::{AgentId, Entities, IntentResult};
use crate::api::ProviderError;
use crate::observability::{EventLedger, NewEvent, Outcome};
use crate::optimization::{Answer, CostOptimizer, TaskContext};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Instant;
use tracing::info;

/// Intent label to destination agent. Anything not listed goes to the inbox agent.
pub const ROUTING_TABLE: &[(&str, AgentId)] = &[
    ("delivery_delay", AgentId::PoTracker),
    ("price_change", AgentId::ChangeManager),
    ("quantity_change", AgentId::ChangeManager),
    ("acknowledgement_request", AgentId::PoTracker),
    ("quality_issue", AgentId::ChangeManager),
    ("general_inquiry", AgentId::InboxAgent),
];

pub const DEFAULT_DESTINATION: AgentId = AgentId::InboxAgent;

pub fn route(intent: &str) -> AgentId {
    ROUTING_TABLE
        .iter()
        .find(|(label, _)| *label == intent)
        .map(|(_, agent)| *agent)
        .unwrap_or(DEFAULT_DESTINATION)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    EscalateIfCritical,
    SendAcknowledgement,
    UpdateErp,
    RequiresApproval,
    LogChange,
    Logged,
}

impl StageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageAction::EscalateIfCritical => "escalate_if_critical",
            StageAction::SendAcknowledgement => "send_acknowledgement",
            StageAction::UpdateErp => "update_erp",
            StageAction::RequiresApproval => "requires_approval",
            StageAction::LogChange => "log_change",
            StageAction::Logged => "logged",
        }
    }

    pub fn for_po_tracker(intent: &str) -> Self {
        match intent {
            "delivery_delay" => StageAction::EscalateIfCritical,
            "acknowledgement_request" => StageAction::SendAcknowledgement,
            _ => StageAction::UpdateErp,
        }
    }

    pub fn for_change_manager(intent: &str) -> Self {
        match intent {
            "price_change" | "quantity_change" => StageAction::RequiresApproval,
            _ => StageAction::LogChange,
        }
    }
}

impl fmt::Display for StageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    pub action: StageAction,
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,
    /// Provider answer backing the action, if one was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl StageResult {
    fn logged() -> Self {
        Self {
            action: StageAction::Logged,
            cost: 0.0,
            po_number: None,
            response: None,
        }
    }
}

/// Everything a stage needs to know about the request
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub intent: &'a IntentResult,
    pub entities: &'a Entities,
    pub sender: &'a str,
    pub execution_id: &'a str,
}

impl StageInput<'_> {
    fn task_context(&self) -> TaskContext {
        TaskContext::new()
            .with_serialized("intent", self.intent)
            .with_serialized("entities", self.entities)
    }
}

pub struct StageRunner<'a> {
    optimizer: &'a CostOptimizer,
    ledger: &'a EventLedger,
}

impl<'a> StageRunner<'a> {
    pub fn new(optimizer: &'a CostOptimizer, ledger: &'a EventLedger) -> Self {
        Self { optimizer, ledger }
    }

    /// Run `agent`'s workflow. Agents without one only log the request.
    pub async fn run(&self, agent: AgentId, input: StageInput<'_>) -> Result<StageResult, ProviderError> {
        match agent {
            AgentId::PoTracker => self.po_tracker(input).await,
            AgentId::ChangeManager => self.change_manager(input).await,
            AgentId::InboxAgent | AgentId::RoutingAgent => Ok(StageResult::logged()),
        }
    }

    async fn po_tracker(&self, input: StageInput<'_>) -> Result<StageResult, ProviderError> {
        let started = Instant::now();
        let po_number = input.entities.po_number.clone();
        let prompt = format!(
            "PO {} has delivery update. Intent: {}. Dates: {:?}",
            po_number.as_deref().unwrap_or("N/A"),
            input.intent.intent,
            input.entities.dates
        );
        let action = StageAction::for_po_tracker(&input.intent.intent);

        let answer = self
            .answer(AgentId::PoTracker, action, "decision_making", &prompt, &input)
            .await?;

        self.ledger.log_event(
            NewEvent::new(AgentId::PoTracker.as_str(), action.as_str())
                .context(&json!({ "po_number": po_number, "sender": input.sender }))
                .cost(answer.cost)
                .duration_ms(elapsed_ms(started))
                .execution_id(input.execution_id),
        );
        info!(execution_id = input.execution_id, %action, cost = answer.cost, "po tracker stage complete");

        Ok(StageResult {
            action,
            cost: answer.cost,
            po_number,
            response: Some(answer.response),
        })
    }

    async fn change_manager(&self, input: StageInput<'_>) -> Result<StageResult, ProviderError> {
        let started = Instant::now();
        let entities = serde_json::to_string(input.entities).unwrap_or_else(|_| format!("{:?}", input.entities));
        let prompt = format!(
            "Analyze impact of {} for supplier {}. Entities: {}",
            input.intent.intent, input.sender, entities
        );
        let action = StageAction::for_change_manager(&input.intent.intent);

        let answer = self
            .answer(AgentId::ChangeManager, action, "multi_step_reasoning", &prompt, &input)
            .await?;

        self.ledger.log_event(
            NewEvent::new(AgentId::ChangeManager.as_str(), action.as_str())
                .context(&json!({ "intent": input.intent.intent, "sender": input.sender }))
                .cost(answer.cost)
                .duration_ms(elapsed_ms(started))
                .execution_id(input.execution_id),
        );
        info!(execution_id = input.execution_id, %action, cost = answer.cost, "change manager stage complete");

        Ok(StageResult {
            action,
            cost: answer.cost,
            po_number: input.entities.po_number.clone(),
            response: Some(answer.response),
        })
    }

    /// One optimizer call; a provider failure is logged against the stage agent
    async fn answer(
        &self,
        agent: AgentId,
        action: StageAction,
        task_type: &str,
        prompt: &str,
        input: &StageInput<'_>,
    ) -> Result<Answer, ProviderError> {
        let started = Instant::now();
        match self
            .optimizer
            .answer(task_type, prompt, &input.task_context(), None)
            .await
        {
            Ok(answer) => Ok(answer),
            Err(e) => {
                self.ledger.log_event(
                    NewEvent::new(agent.as_str(), action.as_str())
                        .context(&json!({ "task_type": task_type, "error": e.to_string() }))
                        .outcome(Outcome::Failure)
                        .duration_ms(elapsed_ms(started))
                        .execution_id(input.execution_id),
                );
                Err(e)
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
