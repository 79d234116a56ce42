//! Agents and the collaborators they depend on
//!
//! Entity extraction and intent classification are pluggable: the
//! orchestrator only talks to the [`EntityExtractor`] and [`IntentClassifier`]
//! traits. [`RuleBasedParser`] is a regex/keyword implementation of both.
//! The [`AgentRegistry`] tracks which named agents are currently busy.

mod registry;
mod rules;

pub use registry::{
    ActiveTaskGuard, AgentDescriptor, AgentId, AgentRegistry, AgentStatus, UnknownAgentError,
};
pub use rules::RuleBasedParser;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Entity extraction failed: {0}")]
    Extraction(String),

    #[error("Intent classification failed: {0}")]
    Classification(String),
}

/// Structured fields pulled out of a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub po_number: Option<String>,
    pub quantities: Vec<String>,
    pub dates: Vec<String>,
    pub part_numbers: Vec<String>,
    pub prices: Vec<String>,
    /// Extraction confidence in `[0, 1]`
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: String,
    /// Classification confidence in `[0, 1]`
    pub confidence: f64,
    pub scores: BTreeMap<String, u32>,
}

#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Extract entities from `text`, using `subject_hint` as extra context.
    /// Returns empty fields rather than an error when nothing matches.
    async fn extract(&self, text: &str, subject_hint: &str) -> Result<Entities, CollaboratorError>;
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, subject: &str, body: &str) -> Result<IntentResult, CollaboratorError>;
}
