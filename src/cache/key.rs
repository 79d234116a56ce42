//! Cache key derivation

use crate::optimization::TaskContext;
use std::fmt;

/// Hex digest identifying a logical task
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprint `(task_type, prompt, context)`.
    ///
    /// The same logical task always yields the same key, regardless of the
    /// order its context entries were inserted in.
    pub fn derive(task_type: &str, prompt: &str, context: &TaskContext) -> Self {
        let material = format!("{}:{}:{}", task_type, prompt, context.canonical_json());
        Self(format!("{:x}", md5::compute(material.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
