//! Per-request workflow state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// States a request moves through.
///
/// Every run starts at `Received` and ends at `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Received,
    Parsed,
    Classified,
    Routed,
    Executing,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "RECEIVED",
            Self::Parsed => "PARSED",
            Self::Classified => "CLASSIFIED",
            Self::Routed => "ROUTED",
            Self::Executing => "EXECUTING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// ```text
/// Received → Parsed → Classified → Routed → Executing → Completed
/// any non-terminal state → Failed
/// ```
fn is_legal_transition(from: WorkflowState, to: WorkflowState) -> bool {
    use WorkflowState::*;

    if to == Failed && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Received, Parsed)
            | (Parsed, Classified)
            | (Classified, Routed)
            | (Routed, Executing)
            | (Executing, Completed)
    )
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Illegal state transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: WorkflowState,
    pub to: WorkflowState,
}

/// One request's walk through [`WorkflowState`]
#[derive(Debug)]
pub struct WorkflowRun {
    execution_id: String,
    current: WorkflowState,
    history: Vec<WorkflowState>,
    started_at: Instant,
}

impl WorkflowRun {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            current: WorkflowState::Received,
            history: vec![WorkflowState::Received],
            started_at: Instant::now(),
        }
    }

    pub fn advance(&mut self, to: WorkflowState) -> Result<(), IllegalTransition> {
        let from = self.current;
        if !is_legal_transition(from, to) {
            return Err(IllegalTransition { from, to });
        }

        debug!(
            execution_id = %self.execution_id,
            %from,
            %to,
            elapsed_ms = self.elapsed_ms(),
            "workflow transition"
        );
        self.current = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `Failed` unless the run already finished
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            self.current = WorkflowState::Failed;
            self.history.push(WorkflowState::Failed);
        }
    }

    pub fn current(&self) -> WorkflowState {
        self.current
    }

    pub fn history(&self) -> &[WorkflowState] {
        &self.history
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64() * 1000.0
    }
}
