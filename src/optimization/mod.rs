//! Cost optimization for inference calls
//!
//! Three pieces cooperate to answer a task as cheaply as possible:
//!
//! - **Tier selection**: pick the minimum adequate [`ModelTier`] for a task type
//! - **Cascading**: try the small tier first and escalate only when its answer
//!   is inadequate or the call fails
//! - **Caching**: never pay twice for the same task (see [`crate::cache`])

mod optimizer;
mod tier;

pub use optimizer::{Answer, AttemptResult, CostOptimizer, OptimizerConfig};
pub use tier::{
    estimate_tokens, is_cascade_eligible, ModelTier, TierPricing, TierSelector, COMPLEX_TASKS,
    MEDIUM_TASKS, MEDIUM_TEXT_THRESHOLD, NEVER_CASCADE_TASKS, SIMPLE_TASKS,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Free-form key/value payload attached to a task.
///
/// Keys are kept sorted so two contexts with the same pairs always serialize
/// identically, whatever order they were built in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskContext {
    entries: BTreeMap<String, Value>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Attach any serializable value; values that fail to serialize are kept
    /// as their debug representation.
    pub fn with_serialized<T>(mut self, key: impl Into<String>, value: &T) -> Self
    where
        T: Serialize + std::fmt::Debug + ?Sized,
    {
        let value = serde_json::to_value(value).unwrap_or_else(|_| Value::String(format!("{:?}", value)));
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Character length of the `text` entry; 0 when absent or not a string
    pub fn text_len(&self) -> usize {
        self.entries
            .get("text")
            .and_then(Value::as_str)
            .map(|text| text.chars().count())
            .unwrap_or(0)
    }

    pub fn requires_reasoning(&self) -> bool {
        matches!(self.entries.get("requires_reasoning"), Some(Value::Bool(true)))
    }

    /// JSON rendering with object keys sorted at every depth
    pub fn canonical_json(&self) -> String {
        let canonical: Map<String, Value> = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), canonicalize(value)))
            .collect();
        Value::Object(canonical).to_string()
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                if let Some(inner) = map.get(key) {
                    sorted.insert(key.clone(), canonicalize(inner));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
