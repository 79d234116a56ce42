//! Bounded FIFO response store

use super::{CacheKey, DEFAULT_CACHE_CAPACITY};
use crate::optimization::TaskContext;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, String>,
    /// Keys in insertion order, oldest first
    order: VecDeque<CacheKey>,
}

/// Maps task fingerprints to previously produced responses.
///
/// Safe to share between concurrent requests. Two requests that miss on the
/// same key may both insert it; the later write wins.
#[derive(Debug)]
pub struct ResponseCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity,
        }
    }

    pub fn get(&self, task_type: &str, prompt: &str, context: &TaskContext) -> Option<String> {
        self.lookup(&CacheKey::derive(task_type, prompt, context))
    }

    pub fn put(&self, task_type: &str, prompt: &str, context: &TaskContext, response: String) {
        self.insert(CacheKey::derive(task_type, prompt, context), response);
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<String> {
        self.state().entries.get(key).cloned()
    }

    /// Store a response, evicting the oldest insert if the cache is full
    pub fn insert(&self, key: CacheKey, response: String) {
        if self.capacity == 0 {
            return;
        }

        let mut state = self.state();

        if let Some(existing) = state.entries.get_mut(&key) {
            *existing = response;
            return;
        }

        if state.entries.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
                debug!(key = %oldest, "evicted oldest cache entry");
            }
        }

        state.order.push_back(key.clone());
        state.entries.insert(key, response);
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: usize) -> CacheKey {
        CacheKey::derive("format_response", &format!("prompt {}", n), &TaskContext::new())
    }

    #[test]
    fn test_get_after_put() {
        let cache = ResponseCache::new(10);
        let context = TaskContext::new().with("text", "hi");

        assert_eq!(cache.get("classify_intent", "p", &context), None);
        cache.put("classify_intent", "p", &context, "answer".to_string());
        assert_eq!(
            cache.get("classify_intent", "p", &context),
            Some("answer".to_string())
        );
    }

    #[test]
    fn test_fifo_evicts_exactly_first_insert() {
        let capacity = 5;
        let cache = ResponseCache::new(capacity);

        for n in 0..=capacity {
            cache.insert(key(n), format!("response {}", n));
        }

        assert_eq!(cache.len(), capacity);
        assert!(!cache.contains(&key(0)));
        for n in 1..=capacity {
            assert!(cache.contains(&key(n)), "key {} should survive", n);
        }
    }

    #[test]
    fn test_reads_do_not_protect_from_eviction() {
        let cache = ResponseCache::new(2);
        cache.insert(key(0), "zero".to_string());
        cache.insert(key(1), "one".to_string());

        // A recent read does not move key 0 to the back of the queue
        assert!(cache.lookup(&key(0)).is_some());
        cache.insert(key(2), "two".to_string());

        assert!(!cache.contains(&key(0)));
        assert!(cache.contains(&key(1)));
        assert!(cache.contains(&key(2)));
    }

    #[test]
    fn test_overwrite_keeps_single_slot() {
        let cache = ResponseCache::new(2);
        cache.insert(key(0), "first".to_string());
        cache.insert(key(0), "second".to_string());
        cache.insert(key(1), "one".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(&key(0)), Some("second".to_string()));

        cache.insert(key(2), "two".to_string());
        assert!(!cache.contains(&key(0)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = ResponseCache::new(0);
        cache.insert(key(0), "zero".to_string());
        assert!(cache.is_empty());
    }
}
