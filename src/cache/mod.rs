//! Response caching for inference calls
//!
//! A response produced for a task is stored under a fingerprint of
//! `(task type, prompt, canonical context)` and served again for free the next
//! time the same logical task comes in.
//!
//! ## Cache Principles
//!
//! 1. **Deterministic keys**: context keys are sorted before hashing
//! 2. **Bounded size**: the store never holds more than its capacity
//! 3. **Strict FIFO**: the oldest insert is evicted first, reads give no protection
//! 4. **Pure store**: hit/miss accounting belongs to the caller

mod key;
mod store;

pub use key::CacheKey;
pub use store::ResponseCache;

/// Default number of responses kept before FIFO eviction starts
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
