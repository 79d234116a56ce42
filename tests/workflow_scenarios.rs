//! End-to-end runs of the sample supplier emails through the full pipeline

use agent_relay::api::{Completion, InferenceProvider, ProviderError, SimulatedProvider};
use agent_relay::observability::{EventLedger, Outcome};
use agent_relay::optimization::{CostOptimizer, ModelTier, OptimizerConfig};
use agent_relay::orchestrator::{InboundRequest, Orchestrator, OrchestratorError, StageAction, WorkflowState};
use agent_relay::{AgentId, AgentStatus, RuleBasedParser};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;

fn orchestrator_with(provider: Arc<dyn InferenceProvider>) -> Orchestrator {
    let parser = Arc::new(RuleBasedParser::new().unwrap());
    Orchestrator::new(
        parser.clone(),
        parser,
        CostOptimizer::new(provider, OptimizerConfig::default()),
        EventLedger::default(),
    )
}

fn orchestrator() -> Orchestrator {
    orchestrator_with(Arc::new(SimulatedProvider::default()))
}

fn delivery_delay() -> InboundRequest {
    InboundRequest::new(
        "supplier@acme.com",
        "PO #12345 Delivery Update",
        "Dear buyer, Purchase Order #12345 will be delayed by 3 days. New delivery date: December 15, 2024. Quantity: 500 units. We apologize for the inconvenience.",
    )
}

fn price_change() -> InboundRequest {
    InboundRequest::new(
        "vendor@supplychain.com",
        "Price Change Notification - Order #67890",
        "Please be advised that the price for Part #ABC-123 has increased from $10.00 to $12.00 per unit, effective January 1, 2025. This affects PO #67890. Please confirm acceptance.",
    )
}

fn acknowledgement() -> InboundRequest {
    InboundRequest::new(
        "manufacturer@global.com",
        "Please acknowledge receipt of PO #99999",
        "We have received your Purchase Order #99999 for 1,000 units. Please confirm receipt so we can proceed with production. Delivery scheduled for March 20, 2025.",
    )
}

fn quantity_change() -> InboundRequest {
    InboundRequest::new(
        "distributor@parts.com",
        "Quantity revision for order #11111",
        "Regarding PO #11111, we need to revise the quantity from 250 units to 300 units. All other terms remain the same. Please confirm if this works.",
    )
}

struct UnavailableProvider;

#[async_trait]
impl InferenceProvider for UnavailableProvider {
    async fn invoke(&self, _tier: ModelTier, _prompt: &str) -> Result<Completion, ProviderError> {
        Err(ProviderError::Provider("503: upstream unavailable".to_string()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

#[tokio::test]
async fn test_sample_emails_route_to_expected_agents() {
    let orchestrator = orchestrator();
    let cases = [
        (delivery_delay(), "delivery_delay", AgentId::PoTracker, StageAction::EscalateIfCritical),
        (price_change(), "price_change", AgentId::ChangeManager, StageAction::RequiresApproval),
        (acknowledgement(), "acknowledgement_request", AgentId::PoTracker, StageAction::SendAcknowledgement),
        (quantity_change(), "quantity_change", AgentId::ChangeManager, StageAction::RequiresApproval),
    ];

    for (request, intent, agent, action) in cases {
        let result = orchestrator.process_request(request).await.unwrap();
        assert_eq!(result.intent, intent);
        assert_eq!(result.routed_agent, agent);
        assert_eq!(result.stage_result.action, action);
        assert!(result.total_cost > 0.0);
        assert_eq!(result.states.last(), Some(&WorkflowState::Completed));
    }

    let global = orchestrator.ledger().global_metrics();
    assert_eq!(global.total_processed, 16);
    assert_eq!(global.success_rate, 100.0);
    assert_eq!(global.events_last_hour, 16);
}

#[tokio::test]
async fn test_entities_reach_the_result() {
    let orchestrator = orchestrator();

    let delay = orchestrator.process_request(delivery_delay()).await.unwrap();
    assert_eq!(delay.entities.po_number.as_deref(), Some("12345"));
    assert_eq!(delay.entities.quantities, vec!["500"]);
    assert_eq!(delay.entities.dates, vec!["December 15, 2024"]);
    assert_eq!(delay.stage_result.po_number.as_deref(), Some("12345"));

    let quantity = orchestrator.process_request(quantity_change()).await.unwrap();
    assert_eq!(quantity.entities.quantities, vec!["250", "300"]);
}

#[tokio::test]
async fn test_every_event_shares_the_execution_id() {
    let orchestrator = orchestrator();
    let result = orchestrator.process_request(price_change()).await.unwrap();

    let events = orchestrator.ledger().timeline(100, None);
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e.execution_id == result.execution_id));

    let change_events = orchestrator.ledger().timeline(10, Some("change_manager"));
    assert_eq!(change_events.len(), 1);
    assert_eq!(change_events[0].action, "requires_approval");
    assert_eq!(change_events[0].cost, result.stage_result.cost);
}

#[tokio::test]
async fn test_repeated_request_is_served_from_cache() {
    let orchestrator = orchestrator();

    let first = orchestrator.process_request(delivery_delay()).await.unwrap();
    let second = orchestrator.process_request(delivery_delay()).await.unwrap();

    assert_ne!(first.execution_id, second.execution_id);
    assert_eq!(first.stage_result.response, second.stage_result.response);
    assert_eq!(second.total_cost, 0.0);

    let stats = orchestrator.optimizer_stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hit_rate, 50.0);
    assert_eq!(stats.total_cost, first.total_cost);
}

#[tokio::test]
async fn test_concurrent_requests_leave_every_agent_idle() {
    let orchestrator = orchestrator();
    let requests = vec![
        delivery_delay(),
        price_change(),
        acknowledgement(),
        quantity_change(),
        delivery_delay(),
        price_change(),
    ];

    let results = join_all(requests.into_iter().map(|r| orchestrator.process_request(r))).await;
    assert!(results.iter().all(|r| r.is_ok()));

    for status in orchestrator.agent_statuses() {
        assert_eq!(status.status, AgentStatus::Idle, "{} still busy", status.id);
        assert_eq!(status.active_tasks, 0);
    }
    assert_eq!(orchestrator.ledger().global_metrics().total_processed, 24);
}

#[tokio::test]
async fn test_provider_outage_fails_the_request_and_is_audited() {
    let orchestrator = orchestrator_with(Arc::new(UnavailableProvider));

    let err = orchestrator.process_request(price_change()).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Provider(_)));

    let failures: Vec<_> = orchestrator
        .ledger()
        .timeline(100, None)
        .into_iter()
        .filter(|e| e.outcome == Outcome::Failure)
        .collect();
    assert!(failures.iter().any(|e| e.agent == "change_manager"));
    assert!(failures.iter().any(|e| e.agent == "orchestrator"));

    assert!(orchestrator
        .agent_statuses()
        .iter()
        .all(|s| s.status == AgentStatus::Idle));
    assert_eq!(orchestrator.optimizer_stats().total_cost, 0.0);
}

#[tokio::test]
async fn test_override_is_counted_for_the_agent() {
    let orchestrator = orchestrator();
    orchestrator.process_request(quantity_change()).await.unwrap();

    let ack = orchestrator
        .override_decision("change_manager", "requires_approval", "pre-approved by buyer")
        .unwrap();
    assert_eq!(ack.status, "overridden");
    assert_eq!(ack.agent, AgentId::ChangeManager);

    let metrics = orchestrator.ledger().agent_metrics("change_manager").unwrap();
    assert_eq!(metrics.overrides, 1);

    assert!(orchestrator
        .override_decision("billing_agent", "approve", "n/a")
        .is_err());
}
