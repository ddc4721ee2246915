//! Tool-call correlation cache.
//!
//! Remembers the name and decoded input of each tool invocation so that the
//! later result event can be rendered with its call context. One cache lives
//! inside each conversation, holds at most `capacity` entries (least recently
//! used evicted first), and is cleared on idle teardown.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::{Map, Value as JsonValue};

use super::events::ToolCall;

/// What the cache remembers about one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedToolCall {
    pub name: String,
    pub raw_input: String,
    pub decoded_input: Option<Map<String, JsonValue>>,
}

impl From<&ToolCall> for CachedToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            name: call.name.clone(),
            raw_input: call.input.clone(),
            decoded_input: call.decoded_input(),
        }
    }
}

/// Bounded id → call map with LRU eviction.
#[derive(Debug)]
pub struct ToolCallCache {
    entries: Mutex<LruCache<String, CachedToolCall>>,
}

impl ToolCallCache {
    /// Create a cache holding at most `capacity` calls (minimum one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Records (or refreshes) a call, marking it most recently used.
    pub fn remember(&self, call: &ToolCall) {
        self.entries
            .lock()
            .put(call.id.clone(), CachedToolCall::from(call));
    }

    /// A lookup counts as a use: the result event keeps the call warm.
    pub fn lookup(&self, id: &str) -> Option<CachedToolCall> {
        self.entries.lock().get(id).cloned()
    }

    /// Reads an entry without touching its recency.
    pub fn peek(&self, id: &str) -> Option<CachedToolCall> {
        self.entries.lock().peek(id).cloned()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str, input: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "calc".to_string(),
            input: input.to_string(),
        }
    }

    #[test]
    fn remembers_name_and_decoded_input() {
        let cache = ToolCallCache::new(8);
        cache.remember(&call("t1", r#"{"a": 2, "b": 3}"#));

        let cached = cache.lookup("t1").unwrap();
        assert_eq!(cached.name, "calc");
        assert_eq!(cached.decoded_input.unwrap()["b"], json!(3));
    }

    #[test]
    fn refresh_replaces_entry_without_growing() {
        let cache = ToolCallCache::new(8);
        cache.remember(&call("t1", "{}"));
        cache.remember(&call("t1", r#"{"a": 1}"#));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("t1").unwrap().raw_input, r#"{"a": 1}"#);
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let cache = ToolCallCache::new(2);
        cache.remember(&call("t1", "{}"));
        cache.remember(&call("t2", "{}"));
        cache.remember(&call("t3", "{}"));

        assert_eq!(cache.len(), 2);
        assert!(cache.lookup("t1").is_none());
        assert!(cache.lookup("t3").is_some());
    }

    #[test]
    fn refresh_promotes_entry_to_most_recent() {
        let cache = ToolCallCache::new(2);
        cache.remember(&call("t1", "{}"));
        cache.remember(&call("t2", "{}"));
        cache.remember(&call("t1", r#"{"a": 1}"#));
        cache.remember(&call("t3", "{}"));

        assert!(cache.peek("t1").is_some());
        assert!(cache.peek("t2").is_none());
        assert!(cache.peek("t3").is_some());
    }

    #[test]
    fn lookup_keeps_call_alive_but_peek_does_not() {
        let cache = ToolCallCache::new(2);
        cache.remember(&call("t1", "{}"));
        cache.remember(&call("t2", "{}"));
        assert!(cache.lookup("t1").is_some());
        cache.remember(&call("t3", "{}"));
        assert!(cache.peek("t1").is_some());
        assert!(cache.peek("t2").is_none());

        assert!(cache.peek("t3").is_some());
        cache.remember(&call("t4", "{}"));
        assert!(cache.peek("t1").is_none());
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let cache = ToolCallCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.remember(&call("t1", "{}"));
        cache.remember(&call("t2", "{}"));
        assert_eq!(cache.len(), 1);
        assert!(cache.peek("t2").is_some());
    }

    #[test]
    fn clear_empties_cache() {
        let cache = ToolCallCache::new(4);
        cache.remember(&call("t1", "{}"));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.lookup("t1").is_none());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_exceeds_capacity_and_keeps_newest(
                capacity in 1usize..16,
                ids in proptest::collection::vec(0u8..32, 0..128)
            ) {
                let cache = ToolCallCache::new(capacity);
                for id in &ids {
                    cache.remember(&call(&format!("t{}", id), "{}"));
                    prop_assert!(cache.len() <= capacity);
                }
                if let Some(last) = ids.last() {
                    let newest = format!("t{}", last);
                    prop_assert!(cache.lookup(&newest).is_some());
                }
            }
        }
    }
}
